use rand::rngs::OsRng;
use rand::RngCore;

/// Identifier namespace: sessions, handles, rooms, and feeds each get their
/// own 63-bit nonzero id, masked down from a full random u64 so it always
/// fits in a JSON number without precision loss.
pub type Identifier = u64;

const MASK: u64 = 0x7fff_ffff_ffff_ffff;

fn random_id() -> Identifier {
    loop {
        let candidate = OsRng.next_u64() & MASK;
        if candidate != 0 {
            return candidate;
        }
    }
}

/// Draws a fresh id and retries while `taken` reports a collision. The
/// caller is expected to hold whatever lock guards the table `taken`
/// consults, so the probe and the eventual insert are atomic together.
pub fn allocate<F>(mut taken: F) -> Identifier
where
    F: FnMut(Identifier) -> bool,
{
    loop {
        let candidate = random_id();
        if !taken(candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn allocate_never_returns_zero() {
        for _ in 0..1000 {
            assert_ne!(allocate(|_| false), 0);
        }
    }

    #[test]
    fn allocate_avoids_collisions() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = allocate(|candidate| seen.contains(&candidate));
            assert!(seen.insert(id), "allocate returned a duplicate id");
        }
    }
}
