//! Conversion between domain events and log envelopes.

use common::AggregateId;
use event_store::EventEnvelope;

use crate::{Aggregate, DomainError, DomainEvent};

/// Wraps a domain event of `A` into an envelope for its stream.
pub fn to_envelope<A: Aggregate>(
    aggregate_id: AggregateId,
    event: &A::Event,
) -> Result<EventEnvelope, DomainError> {
    Ok(EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type(A::aggregate_type())
        .event_type(event.event_type())
        .version(event.version())
        .payload(event)?
        .build()?)
}

/// Rebuilds an aggregate from its stream.
///
/// Returns None when the stream holds no events. Envelopes of another
/// aggregate type are skipped.
pub fn replay<A: Aggregate>(envelopes: &[EventEnvelope]) -> Result<Option<A>, DomainError> {
    let mut aggregate = A::default();
    let mut seen = false;

    for envelope in envelopes {
        if envelope.aggregate_type != A::aggregate_type() {
            continue;
        }
        let event: A::Event = envelope.decode()?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
        seen = true;
    }

    Ok(seen.then_some(aggregate))
}
