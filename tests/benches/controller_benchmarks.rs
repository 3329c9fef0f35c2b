//! # Overlay-Controller Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | `known_member` | Cached decision for an authorized member |
//! | `first_contact` | Decision that creates a member and assigns an address |
//! | `aggregate` | Network-wide fold over a 1000-member snapshot |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use oc_01_network_controller::domain::{IpAssignmentPool, V4AssignMode};
use oc_01_network_controller::{
    aggregate, ConfigRequest, ControllerAdminApi, ControllerConfig, ControllerDependencies,
    ControllerService, Identity, InMemoryNetworkStore, Member, NetworkConfigApi, NetworkId,
    NetworkUpdate, NodeAddress, SystemTimeSource,
};

const CONTROLLER: NodeAddress = NodeAddress(0x8056c2e21c);

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn request(nwid: NetworkId, address: NodeAddress) -> ConfigRequest {
    ConfigRequest::new(
        Identity::new(CONTROLLER, Vec::new()),
        Identity::new(address, address.to_bytes().to_vec()),
        nwid,
    )
}

fn setup(rt: &tokio::runtime::Runtime) -> (Arc<ControllerService>, NetworkId) {
    let service = Arc::new(ControllerService::new(
        CONTROLLER,
        ControllerConfig::for_testing(),
        ControllerDependencies {
            store: Arc::new(InMemoryNetworkStore::new()),
            time_source: Arc::new(SystemTimeSource::new()),
        },
    ));
    let network = rt
        .block_on(service.create_network(
            None,
            NetworkUpdate {
                private: Some(false),
                v4_assign_mode: Some(V4AssignMode { zt: true }),
                ip_assignment_pools: Some(vec![IpAssignmentPool::new(
                    "10.0.0.1".parse().unwrap(),
                    "10.255.255.254".parse().unwrap(),
                )]),
                ..Default::default()
            },
        ))
        .unwrap();
    (service, network.id)
}

fn bench_decisions(c: &mut Criterion) {
    let rt = runtime();
    let (service, nwid) = setup(&rt);
    let mut group = c.benchmark_group("oc-01-decision");

    let known = NodeAddress(0xdeadbeef01);
    rt.block_on(service.request_network_config(request(nwid, known)))
        .unwrap();
    group.bench_function("known_member", |b| {
        b.iter(|| {
            rt.block_on(service.request_network_config(black_box(request(nwid, known))))
                .unwrap()
        })
    });

    let next = AtomicU64::new(1);
    group.bench_function("first_contact", |b| {
        b.iter(|| {
            let address = NodeAddress(next.fetch_add(1, Ordering::Relaxed));
            rt.block_on(service.request_network_config(request(nwid, address)))
                .unwrap()
        })
    });

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let nwid = NetworkId::for_controller(CONTROLLER, 1);
    let mut group = c.benchmark_group("oc-01-aggregate");
    for size in [100usize, 1_000] {
        let members: Vec<Member> = (1..=size as u64)
            .map(|raw| {
                let mut m = Member::new(nwid, NodeAddress(raw), 0);
                m.authorized = raw % 2 == 0;
                m.ip_assignments.push(std::net::IpAddr::from([10, 0, (raw >> 8) as u8, raw as u8]));
                m
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &members, |b, members| {
            b.iter(|| aggregate(black_box(members.iter()), 1_000, 125_000))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decisions, bench_aggregate);
criterion_main!(benches);
