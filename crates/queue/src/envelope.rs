use uuid::Uuid;

/// The unit of delivery from the queue: a raw body plus a transport-assigned
/// delivery id.
///
/// The envelope stays owned by the transport until the consumer explicitly
/// completes it; the processed state lives with the transport and its
/// transition is one-way (pending → processed, never reversed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: Uuid,
    pub body: String,
}

impl Envelope {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: body.into(),
        }
    }
}
