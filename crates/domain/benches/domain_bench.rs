use common::{AggregateId, Version};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Account, Aggregate, CreateAccount, CreateCustomer, Customer, LockAccount, UnlockAccount,
    UpdateCustomer, replay, to_envelope,
};
use event_store::EventEnvelope;

fn customer_history(id: AggregateId, updates: i64) -> Vec<EventEnvelope> {
    let mut customer = Customer::default();
    let mut envelopes = Vec::new();

    let events = customer
        .create(&CreateCustomer::new(id, "Ada", "Lovelace"))
        .unwrap();
    for e in &events {
        envelopes.push(to_envelope::<Customer>(id, e).unwrap());
    }
    customer.apply_events(events);

    for v in 2..=updates + 1 {
        let events = customer
            .update(&UpdateCustomer::new(id, Version::new(v), "Ada", format!("L{v}")))
            .unwrap();
        for e in &events {
            envelopes.push(to_envelope::<Customer>(id, e).unwrap());
        }
        customer.apply_events(events);
    }

    envelopes
}

fn bench_create_customer(c: &mut Criterion) {
    c.bench_function("domain/create_customer", |b| {
        b.iter(|| {
            let id = AggregateId::new();
            let mut customer = Customer::default();
            let events = customer
                .create(&CreateCustomer::new(id, "Ada", "Lovelace"))
                .unwrap();
            customer.apply_events(events);
        });
    });
}

fn bench_account_lock_cycle(c: &mut Criterion) {
    c.bench_function("domain/account_lock_unlock_10", |b| {
        b.iter(|| {
            let id = AggregateId::new();
            let mut account = Account::default();
            account.apply_events(
                account
                    .create(&CreateAccount::new(id, AggregateId::new(), "EUR"))
                    .unwrap(),
            );
            for i in 0..5 {
                let v = 2 + i * 2;
                account.apply_events(account.lock(&LockAccount::new(id, Version::new(v))).unwrap());
                account.apply_events(
                    account
                        .unlock(&UnlockAccount::new(id, Version::new(v + 1)))
                        .unwrap(),
                );
            }
        });
    });
}

fn bench_replay_100(c: &mut Criterion) {
    let id = AggregateId::new();
    let envelopes = customer_history(id, 99);

    c.bench_function("domain/replay_100_events", |b| {
        b.iter(|| {
            let customer: Customer = replay(&envelopes).unwrap().unwrap();
            assert_eq!(customer.version(), Version::new(100));
        });
    });
}

criterion_group!(
    benches,
    bench_create_customer,
    bench_account_lock_cycle,
    bench_replay_100,
);
criterion_main!(benches);
