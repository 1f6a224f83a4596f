
// Faces are owned by the host forwarder's face table; the strategy only ever
// holds handles and asks the host whether a handle still refers to a live face.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FaceHandle(pub u32);
