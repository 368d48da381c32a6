use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use devportal_applications::NewApplication;
use devportal_catalog::NewProduct;
use devportal_core::{ApplicationId, EnvironmentId, PageRequest, ProductId, UserId};
use devportal_infra::{Portal, PortalConfig};

/// A portal with `products` live products and one registered application.
fn setup_portal(products: usize) -> (Portal, ApplicationId, EnvironmentId, Vec<ProductId>) {
    let portal = Portal::new(PortalConfig::default()).unwrap();
    let actor = UserId::new();

    let product_ids = (0..products)
        .map(|i| {
            portal
                .catalog()
                .create_product(NewProduct::named(format!("product-{i}")), actor)
                .unwrap()
                .id
        })
        .collect();
    let application = portal
        .registry()
        .register(NewApplication::named("bench-app"), actor)
        .unwrap();
    let environment = portal
        .environments()
        .by_name("development")
        .unwrap()
        .unwrap();

    (portal, application.id, environment.id, product_ids)
}

fn bench_create_subscription(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_subscription");
    group.throughput(Throughput::Elements(1));

    // First subscription of a slot provisions the credential; the rest reuse it.
    group.bench_function("first_in_slot", |b| {
        b.iter_with_setup(
            || setup_portal(1),
            |(portal, app, env, products)| {
                let sub = portal
                    .engine()
                    .create_subscription(app, products[0], env, UserId::new())
                    .unwrap();
                black_box(sub);
            },
        );
    });

    group.bench_function("shared_slot", |b| {
        b.iter_with_setup(
            || {
                let fixture = setup_portal(2);
                let (portal, app, env, products) = &fixture;
                portal
                    .engine()
                    .create_subscription(*app, products[0], *env, UserId::new())
                    .unwrap();
                fixture
            },
            |(portal, app, env, products)| {
                let sub = portal
                    .engine()
                    .create_subscription(app, products[1], env, UserId::new())
                    .unwrap();
                black_box(sub);
            },
        );
    });

    group.finish();
}

fn bench_list_entitlements(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_entitlements");

    for count in [1usize, 10, 100, 1000].iter() {
        let (portal, app, env, products) = setup_portal(*count);
        for product in &products {
            portal
                .engine()
                .create_subscription(app, *product, env, UserId::new())
                .unwrap();
        }

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let entitled: Vec<_> = portal
                    .engine()
                    .list_entitlements(black_box(app), black_box(env))
                    .unwrap()
                    .collect();
                black_box(entitled);
            });
        });
    }

    group.finish();
}

fn bench_index_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_listing");

    for count in [10usize, 100, 1000].iter() {
        let (portal, app, env, products) = setup_portal(*count);
        for product in &products {
            portal
                .engine()
                .create_subscription(app, *product, env, UserId::new())
                .unwrap();
        }
        let request = PageRequest::new(0, 50);

        group.bench_with_input(BenchmarkId::new("subscriptions_in_environment", count), count, |b, _| {
            b.iter(|| {
                let page = portal
                    .subscriptions_in_environment(black_box(env), &request)
                    .unwrap();
                black_box(page);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_subscription,
    bench_list_entitlements,
    bench_index_listing
);
criterion_main!(benches);
