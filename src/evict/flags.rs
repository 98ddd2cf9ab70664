/// Flags accepted by `evict()`. `single` means the caller already holds
/// tree-wide exclusivity (sync/close) so hazard coordination and subtree
/// unlock-on-failure can be skipped. `wait` means a hazard conflict should
/// be spun out rather than surfaced as contention.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct EvictFlags {
    single: bool,
    wait: bool,
}

impl EvictFlags {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn with_wait(mut self) -> Self {
        self.wait = true;
        self
    }

    pub fn is_single(self) -> bool {
        self.single
    }

    pub fn is_wait(self) -> bool {
        self.wait
    }
}
