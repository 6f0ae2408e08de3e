use std::cell::Cell;
use std::rc::Rc;

/// Depth counter for nested block parsing, owned by one parser.
#[derive(Clone, Debug, Default)]
pub(crate) struct NestingDepth(Rc<Cell<usize>>);

impl NestingDepth {
    /// Takes one level, or `None` once `limit` levels are held.
    pub(crate) fn enter(&self, limit: usize) -> Option<DepthGuard> {
        let depth = self.0.get();
        if depth >= limit {
            return None;
        }
        self.0.set(depth + 1);
        Some(DepthGuard(Rc::clone(&self.0)))
    }

    pub(crate) fn current(&self) -> usize {
        self.0.get()
    }
}

/// Gives its level back when dropped, on every exit path.
#[derive(Debug)]
pub(crate) struct DepthGuard(Rc<Cell<usize>>);

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::NestingDepth;

    fn descend(depth: &NestingDepth, limit: usize, remaining: usize) -> usize {
        let Some(_guard) = depth.enter(limit) else {
            return depth.current();
        };
        if remaining == 0 {
            return depth.current();
        }
        descend(depth, limit, remaining - 1)
    }

    #[test]
    fn guard_releases_on_early_return() {
        let depth = NestingDepth::default();
        assert_eq!(descend(&depth, 3, 10), 3);
        assert_eq!(depth.current(), 0);
    }

    #[test]
    fn limit_zero_never_enters() {
        let depth = NestingDepth::default();
        assert!(depth.enter(0).is_none());
        let first = depth.enter(1).expect("first level");
        assert!(depth.enter(1).is_none());
        drop(first);
        assert!(depth.enter(1).is_some());
    }
}
