// Lock modes.
//
// A mode is a pair of components: the version side (what the holder does to
// the versioned, snapshot-visible state) and the current side (what it does
// to the current state). Snapshot readers take V* modes and coexist with
// current writers; only VX, the destructive version-exclusive mode, blocks
// everyone.

use serde::{Deserialize, Serialize};

/// The sixteen lock modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    /// Version intent shared.
    VIS,
    /// Version shared.
    VS,
    /// Intent shared.
    IS,
    /// VS + IS.
    VSIS,
    /// Intent exclusive.
    IX,
    /// Shared.
    S,
    /// VS + IX.
    VSIX,
    /// Version intent exclusive.
    VIX,
    /// VS + VIX.
    VSVIX,
    /// S + IX.
    SIX,
    /// Update.
    U,
    /// S + VIX.
    SVIX,
    /// Exclusive.
    X,
    /// VIX + X.
    VIXX,
    /// Version exclusive.
    VX,
    /// No lock.
    N,
}

/// Whether a child-level lock is needed under a given parent mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Possibility {
    /// The parent mode does not permit the child lock.
    Impossible,
    /// Permitted and needed.
    Possible,
    /// Permitted but already covered by the parent.
    Unnecessary,
}

/// Version-side component, ordered by coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart {
    None,
    Vis,
    Vs,
    Vix,
    VsVix,
    Vx,
}

/// Current-side component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentPart {
    None,
    Is,
    Ix,
    S,
    Six,
    U,
    X,
}

impl LockMode {
    fn parts(self) -> (VersionPart, CurrentPart) {
        use CurrentPart as C;
        use VersionPart as V;
        match self {
            LockMode::N => (V::None, C::None),
            LockMode::VIS => (V::Vis, C::None),
            LockMode::VS => (V::Vs, C::None),
            LockMode::IS => (V::None, C::Is),
            LockMode::VSIS => (V::Vs, C::Is),
            LockMode::IX => (V::None, C::Ix),
            LockMode::S => (V::None, C::S),
            LockMode::VSIX => (V::Vs, C::Ix),
            LockMode::VIX => (V::Vix, C::None),
            LockMode::VSVIX => (V::VsVix, C::None),
            LockMode::SIX => (V::None, C::Six),
            LockMode::U => (V::None, C::U),
            LockMode::SVIX => (V::Vix, C::S),
            LockMode::X => (V::None, C::X),
            LockMode::VIXX => (V::Vix, C::X),
            LockMode::VX => (V::Vx, C::None),
        }
    }

    fn from_parts(version: VersionPart, current: CurrentPart) -> Option<LockMode> {
        use CurrentPart as C;
        use VersionPart as V;
        Some(match (version, current) {
            (V::None, C::None) => LockMode::N,
            (V::Vis, C::None) => LockMode::VIS,
            (V::Vs, C::None) => LockMode::VS,
            (V::None, C::Is) => LockMode::IS,
            (V::Vs, C::Is) => LockMode::VSIS,
            (V::None, C::Ix) => LockMode::IX,
            (V::None, C::S) => LockMode::S,
            (V::Vs, C::Ix) => LockMode::VSIX,
            (V::Vix, C::None) => LockMode::VIX,
            (V::VsVix, C::None) => LockMode::VSVIX,
            (V::None, C::Six) => LockMode::SIX,
            (V::None, C::U) => LockMode::U,
            (V::Vix, C::S) => LockMode::SVIX,
            (V::None, C::X) => LockMode::X,
            (V::Vix, C::X) => LockMode::VIXX,
            (V::Vx, C::None) => LockMode::VX,
            _ => return None,
        })
    }

    pub fn is_need_lock(self) -> bool {
        self != LockMode::N
    }

    /// Compatibility of a requested mode against a granted one. The two
    /// sides check independently: version locks only conflict on VX, and
    /// the current side follows the classical multi-granularity matrix.
    pub fn is_compatible(granted: LockMode, requested: LockMode) -> bool {
        if granted == LockMode::N || requested == LockMode::N {
            return true;
        }
        let (gv, gc) = granted.parts();
        let (rv, rc) = requested.parts();
        // Version exclusivity blocks everything else.
        if gv == VersionPart::Vx || rv == VersionPart::Vx {
            return false;
        }
        current_compatible(gc, rc)
    }

    /// Least upper bound: the mode an object ends up locked in when a
    /// holder of `granted` acquires `requested` as well.
    pub fn least_upper_bound(granted: LockMode, requested: LockMode) -> LockMode {
        let (gv, gc) = granted.parts();
        let (rv, rc) = requested.parts();
        let version = version_lub(gv, rv);
        let current = current_lub(gc, rc);
        match LockMode::from_parts(version, current) {
            Some(mode) => mode,
            // Pairs outside the sixteen named modes escalate to the
            // cheapest named mode covering both components.
            None => escalate(version, current),
        }
    }

    /// Whether a child object may (or must) be locked in `child` while the
    /// parent is held in `parent`.
    pub fn is_possible(parent: LockMode, child: LockMode) -> Possibility {
        if child == LockMode::N {
            return Possibility::Unnecessary;
        }
        let (pv, pc) = parent.parts();
        let (cv, cc) = child.parts();

        // A parent exclusive on a side covers every child access there.
        let version_covered = pv == VersionPart::Vx
            || (matches!(pv, VersionPart::Vs | VersionPart::VsVix)
                && matches!(cv, VersionPart::Vs | VersionPart::Vis));
        let current_covered = pc == CurrentPart::X
            || (matches!(pc, CurrentPart::S | CurrentPart::Six | CurrentPart::U)
                && matches!(cc, CurrentPart::Is | CurrentPart::S));
        let needs_version = cv != VersionPart::None;
        let needs_current = cc != CurrentPart::None;
        if (!needs_version || version_covered) && (!needs_current || current_covered) {
            return Possibility::Unnecessary;
        }

        // Otherwise the parent must carry the matching intents.
        let version_permitted = !needs_version
            || version_covered
            || matches!(pv, VersionPart::Vis | VersionPart::Vix | VersionPart::VsVix)
            || (child_is_version_exclusive(cv) && matches!(pv, VersionPart::Vix | VersionPart::VsVix));
        let current_permitted = !needs_current
            || current_covered
            || match cc {
                CurrentPart::Is | CurrentPart::S => matches!(
                    pc,
                    CurrentPart::Is | CurrentPart::Ix | CurrentPart::Six | CurrentPart::U
                ),
                CurrentPart::Ix | CurrentPart::U | CurrentPart::Six | CurrentPart::X => {
                    matches!(pc, CurrentPart::Ix | CurrentPart::Six)
                }
                CurrentPart::None => true,
            };
        if version_permitted && current_permitted {
            Possibility::Possible
        } else {
            Possibility::Impossible
        }
    }
}

fn child_is_version_exclusive(cv: VersionPart) -> bool {
    matches!(cv, VersionPart::Vx | VersionPart::Vix | VersionPart::VsVix)
}

fn current_compatible(granted: CurrentPart, requested: CurrentPart) -> bool {
    use CurrentPart as C;
    matches!(
        (granted, requested),
        (C::None, _)
            | (_, C::None)
            | (C::Is, C::Is)
            | (C::Is, C::Ix)
            | (C::Is, C::S)
            | (C::Is, C::Six)
            | (C::Is, C::U)
            | (C::Ix, C::Is)
            | (C::Ix, C::Ix)
            | (C::S, C::Is)
            | (C::S, C::S)
            | (C::S, C::U)
            | (C::Six, C::Is)
            | (C::U, C::Is)
            | (C::U, C::S)
            | (C::U, C::U)
    )
}

fn current_lub(a: CurrentPart, b: CurrentPart) -> CurrentPart {
    use CurrentPart as C;
    if a == b {
        return a;
    }
    match (a, b) {
        (C::None, other) | (other, C::None) => other,
        (C::X, _) | (_, C::X) => C::X,
        (C::Is, other) | (other, C::Is) => match other {
            C::Ix | C::S | C::Six | C::U => other,
            _ => C::X,
        },
        (C::Six, _) | (_, C::Six) => C::Six,
        (C::Ix, C::S) | (C::S, C::Ix) => C::Six,
        (C::Ix, C::U) | (C::U, C::Ix) => C::Six,
        (C::S, C::U) | (C::U, C::S) => C::U,
        _ => C::X,
    }
}

fn version_lub(a: VersionPart, b: VersionPart) -> VersionPart {
    use VersionPart as V;
    if a == b {
        return a;
    }
    match (a, b) {
        (V::None, other) | (other, V::None) => other,
        (V::Vx, _) | (_, V::Vx) => V::Vx,
        (V::VsVix, _) | (_, V::VsVix) => V::VsVix,
        (V::Vis, other) | (other, V::Vis) => other,
        (V::Vs, V::Vix) | (V::Vix, V::Vs) => V::VsVix,
        _ => V::Vx,
    }
}

/// Cheapest named mode whose components cover the given pair.
fn escalate(version: VersionPart, current: CurrentPart) -> LockMode {
    use CurrentPart as C;
    use VersionPart as V;
    const ALL: [LockMode; 16] = [
        LockMode::N,
        LockMode::VIS,
        LockMode::VS,
        LockMode::IS,
        LockMode::VSIS,
        LockMode::IX,
        LockMode::S,
        LockMode::VSIX,
        LockMode::VIX,
        LockMode::VSVIX,
        LockMode::SIX,
        LockMode::U,
        LockMode::SVIX,
        LockMode::X,
        LockMode::VIXX,
        LockMode::VX,
    ];
    fn version_rank(v: V) -> u8 {
        match v {
            V::None => 0,
            V::Vis => 1,
            V::Vs | V::Vix => 2,
            V::VsVix => 3,
            V::Vx => 4,
        }
    }
    fn version_covers(holder: V, needed: V) -> bool {
        holder == needed
            || match needed {
                V::None => true,
                V::Vis => holder != V::None,
                V::Vs => matches!(holder, V::Vs | V::VsVix | V::Vx),
                V::Vix => matches!(holder, V::Vix | V::VsVix | V::Vx),
                V::VsVix => matches!(holder, V::VsVix | V::Vx),
                V::Vx => holder == V::Vx,
            }
    }
    fn current_rank(c: C) -> u8 {
        match c {
            C::None => 0,
            C::Is => 1,
            C::Ix | C::S => 2,
            C::U => 3,
            C::Six => 4,
            C::X => 5,
        }
    }
    fn current_covers(holder: C, needed: C) -> bool {
        holder == needed
            || match needed {
                C::None => true,
                C::Is => holder != C::None,
                C::Ix => matches!(holder, C::Ix | C::Six | C::X),
                C::S => matches!(holder, C::S | C::Six | C::U | C::X),
                C::U => matches!(holder, C::U | C::X),
                C::Six => matches!(holder, C::Six | C::X),
                C::X => holder == C::X,
            }
    }

    ALL.iter()
        .copied()
        .filter(|mode| {
            let (v, c) = mode.parts();
            version_covers(v, version) && current_covers(c, current)
        })
        .min_by_key(|mode| {
            let (v, c) = mode.parts();
            (version_rank(v) as u16 + current_rank(c) as u16, version_rank(v))
        })
        .unwrap_or(LockMode::VX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_is_compatible_with_everything() {
        for mode in [LockMode::X, LockMode::VX, LockMode::S, LockMode::VIS] {
            assert!(LockMode::is_compatible(LockMode::N, mode));
            assert!(LockMode::is_compatible(mode, LockMode::N));
        }
    }

    #[test]
    fn classical_current_matrix() {
        assert!(LockMode::is_compatible(LockMode::IS, LockMode::IX));
        assert!(LockMode::is_compatible(LockMode::S, LockMode::S));
        assert!(LockMode::is_compatible(LockMode::S, LockMode::U));
        assert!(LockMode::is_compatible(LockMode::U, LockMode::U));
        assert!(!LockMode::is_compatible(LockMode::S, LockMode::IX));
        assert!(!LockMode::is_compatible(LockMode::X, LockMode::S));
        assert!(!LockMode::is_compatible(LockMode::SIX, LockMode::IX));
        assert!(LockMode::is_compatible(LockMode::SIX, LockMode::IS));
    }

    #[test]
    fn snapshot_readers_pass_current_writers() {
        assert!(LockMode::is_compatible(LockMode::X, LockMode::VS));
        assert!(LockMode::is_compatible(LockMode::VS, LockMode::X));
        assert!(LockMode::is_compatible(LockMode::VIS, LockMode::IX));
        assert!(LockMode::is_compatible(LockMode::VS, LockMode::VIX));
    }

    #[test]
    fn version_exclusive_blocks_everyone() {
        for mode in [
            LockMode::VS,
            LockMode::VIS,
            LockMode::S,
            LockMode::X,
            LockMode::IX,
            LockMode::VX,
        ] {
            assert!(!LockMode::is_compatible(LockMode::VX, mode));
            assert!(!LockMode::is_compatible(mode, LockMode::VX));
        }
        assert!(LockMode::is_compatible(LockMode::VX, LockMode::N));
    }

    #[test]
    fn lub_of_named_pairs() {
        assert_eq!(
            LockMode::least_upper_bound(LockMode::VS, LockMode::IX),
            LockMode::VSIX
        );
        assert_eq!(
            LockMode::least_upper_bound(LockMode::S, LockMode::IX),
            LockMode::SIX
        );
        assert_eq!(
            LockMode::least_upper_bound(LockMode::VS, LockMode::VIX),
            LockMode::VSVIX
        );
        assert_eq!(
            LockMode::least_upper_bound(LockMode::VIX, LockMode::X),
            LockMode::VIXX
        );
        assert_eq!(
            LockMode::least_upper_bound(LockMode::N, LockMode::U),
            LockMode::U
        );
        assert_eq!(
            LockMode::least_upper_bound(LockMode::S, LockMode::U),
            LockMode::U
        );
    }

    #[test]
    fn lub_is_reflexive_and_absorbs_n() {
        const ALL: [LockMode; 16] = [
            LockMode::N,
            LockMode::VIS,
            LockMode::VS,
            LockMode::IS,
            LockMode::VSIS,
            LockMode::IX,
            LockMode::S,
            LockMode::VSIX,
            LockMode::VIX,
            LockMode::VSVIX,
            LockMode::SIX,
            LockMode::U,
            LockMode::SVIX,
            LockMode::X,
            LockMode::VIXX,
            LockMode::VX,
        ];
        for mode in ALL {
            assert_eq!(LockMode::least_upper_bound(mode, mode), mode);
            assert_eq!(LockMode::least_upper_bound(mode, LockMode::N), mode);
            assert_eq!(LockMode::least_upper_bound(LockMode::N, mode), mode);
        }
    }

    #[test]
    fn lub_is_commutative() {
        const SAMPLE: [LockMode; 8] = [
            LockMode::VIS,
            LockMode::VS,
            LockMode::IS,
            LockMode::IX,
            LockMode::S,
            LockMode::U,
            LockMode::X,
            LockMode::VIX,
        ];
        for a in SAMPLE {
            for b in SAMPLE {
                assert_eq!(
                    LockMode::least_upper_bound(a, b),
                    LockMode::least_upper_bound(b, a),
                    "{a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn possibility_basics() {
        // Reading a child under an intent-shared parent is needed.
        assert_eq!(
            LockMode::is_possible(LockMode::IS, LockMode::S),
            Possibility::Possible
        );
        // A shared parent already covers child reads.
        assert_eq!(
            LockMode::is_possible(LockMode::S, LockMode::S),
            Possibility::Unnecessary
        );
        // Writing a child needs an exclusive intent.
        assert_eq!(
            LockMode::is_possible(LockMode::IS, LockMode::X),
            Possibility::Impossible
        );
        assert_eq!(
            LockMode::is_possible(LockMode::IX, LockMode::X),
            Possibility::Possible
        );
        // An exclusive parent covers everything below.
        assert_eq!(
            LockMode::is_possible(LockMode::X, LockMode::X),
            Possibility::Unnecessary
        );
        // Version reads under a version intent.
        assert_eq!(
            LockMode::is_possible(LockMode::VIS, LockMode::VS),
            Possibility::Possible
        );
        assert_eq!(
            LockMode::is_possible(LockMode::VIX, LockMode::VX),
            Possibility::Possible
        );
    }
}
