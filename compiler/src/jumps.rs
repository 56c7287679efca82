//! Forward-jump patching.

/// Sentinel written into a branch's target field until it is resolved.
pub const UNRESOLVED_ADDR: u32 = u32::MAX;

/// A forward-branch label awaiting its target.
///
/// Each recorded site is the *end* offset of a branch instruction whose
/// final four bytes hold the target address; resolution overwrites those
/// bytes in place with the big-endian target. Backward branches never
/// need a placeholder — their targets are known when they are emitted.
#[derive(Debug, Default)]
pub struct Placeholder {
    sites: Vec<usize>,
    resolved: bool,
}

impl Placeholder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a branch instruction ending at `end_offset` as targeting
    /// this label.
    pub fn add_site(&mut self, end_offset: usize) {
        assert!(
            !self.resolved,
            "branch site added after the placeholder was resolved"
        );
        self.sites.push(end_offset);
    }

    /// Patch every recorded site to jump to `target`. Resolving a
    /// placeholder twice is a compiler bug.
    pub fn resolve(&mut self, target: u32, bytecode: &mut [u8]) {
        assert!(!self.resolved, "placeholder resolved twice");
        self.resolved = true;
        for &site in &self.sites {
            bytecode[site - 4..site].copy_from_slice(&target.to_be_bytes());
        }
    }
}
