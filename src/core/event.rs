/// Something the world noticed while reconciling handles after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldEvent {
    /// The engine dropped the body on its own (e.g. it left the kill bounds)
    /// and its handle was retired.
    BodyRemoved { identity: u16 },
}

impl WorldEvent {
    /// Identity of the body the event is about.
    pub fn identity(&self) -> u16 {
        match *self {
            WorldEvent::BodyRemoved { identity } => identity,
        }
    }
}
