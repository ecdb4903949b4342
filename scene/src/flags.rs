use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SceneFlags: u8 {
        /// Instances changed since the last top level build.
        const DIRTY = 1 << 0;
    }
}
