#![cfg(feature = "integration-tests")]

use common::domain::{
    CreateDeviceActivationInput, CreateDeviceQueueItemInput, DeviceActivationRepository,
    DeviceProfileRepository, DeviceQueueRepository, DeviceRepository, DomainError,
    RoutingProfileRepository, ServiceProfileRepository,
};
use common::lorawan::{Aes128Key, DevAddr, Eui64};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresDeviceActivationRepository,
    PostgresDeviceQueueRepository, PostgresDeviceRepository, PostgresProfileRepository,
};
use goose::MigrationRunner;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

const DEV_EUI: Eui64 = Eui64([1, 2, 3, 4, 5, 6, 7, 8]);
const JOIN_EUI: Eui64 = Eui64([8, 7, 6, 5, 4, 3, 2, 1]);

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    // Run migrations
    let migrations_dir = format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR"));
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    MigrationRunner::postgres(goose_path.to_string_lossy().to_string(), migrations_dir, dsn)
        .run_migrations()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
        ..PostgresConfig::default()
    })
    .expect("Failed to create client");
    client.ping().await.expect("Schema check failed");

    seed_device(&client).await;
    (postgres, client)
}

async fn seed_device(client: &PostgresClient) {
    let conn = client.connection().await.unwrap();
    conn.batch_execute(
        "INSERT INTO device_profile (device_profile_id, supports_join, mac_version)
         VALUES ('dp-1', TRUE, '1.0.2');
         INSERT INTO service_profile (service_profile_id, dr_max) VALUES ('sp-1', 5);
         INSERT INTO routing_profile (routing_profile_id, as_id) VALUES ('rp-1', 'as-1');",
    )
    .await
    .unwrap();
    conn.execute(
        "INSERT INTO device (dev_eui, device_profile_id, service_profile_id, routing_profile_id)
         VALUES ($1, 'dp-1', 'sp-1', 'rp-1')",
        &[&DEV_EUI.as_bytes()],
    )
    .await
    .unwrap();
}

fn queue_item(f_cnt: u32, confirmed: bool) -> CreateDeviceQueueItemInput {
    CreateDeviceQueueItemInput {
        dev_eui: DEV_EUI,
        frm_payload: vec![1, 2, 3, f_cnt as u8],
        f_cnt,
        f_port: 10,
        confirmed,
        retry_count: if confirmed { 2 } else { 0 },
        emit_at: None,
        forwarded_at: None,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_device_and_profile_lookups() {
    let (_container, client) = setup_test_db().await;
    let devices = PostgresDeviceRepository::new(client.clone());
    let profiles = PostgresProfileRepository::new(client);

    let device = devices.get_device(&DEV_EUI).await.unwrap().unwrap();
    assert_eq!(device.device_profile_id, "dp-1");
    assert_eq!(device.routing_profile_id, "rp-1");
    assert!(device.created_at.is_some());
    assert!(devices.get_device(&JOIN_EUI).await.unwrap().is_none());

    let device_profile = profiles.get_device_profile("dp-1").await.unwrap().unwrap();
    assert!(device_profile.supports_join);
    assert_eq!(device_profile.mac_version, "1.0.2");

    let service_profile = profiles.get_service_profile("sp-1").await.unwrap().unwrap();
    assert_eq!(service_profile.dr_max, 5);

    let routing_profile = profiles.get_routing_profile("rp-1").await.unwrap().unwrap();
    assert_eq!(routing_profile.as_id, "as-1");
    assert!(profiles.get_routing_profile("missing").await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_device_queue_crud_operations() {
    let (_container, client) = setup_test_db().await;
    let queue = PostgresDeviceQueueRepository::new(client);

    // Test Create (out of order)
    let second = queue.create_device_queue_item(queue_item(11, true)).await.unwrap();
    let first = queue.create_device_queue_item(queue_item(10, false)).await.unwrap();
    assert_eq!(first.f_cnt, 10);
    assert_eq!(second.retry_count, 2);

    // Test uniqueness of (dev_eui, f_cnt)
    let duplicate = queue.create_device_queue_item(queue_item(10, false)).await;
    assert!(matches!(duplicate, Err(DomainError::DeviceQueueItemAlreadyExists(_))));

    // Test ordering
    let next = queue
        .get_next_device_queue_item_for_dev_eui(&DEV_EUI)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.id, first.id);
    let all = queue.get_device_queue_items_for_dev_eui(&DEV_EUI).await.unwrap();
    let f_cnts: Vec<u32> = all.iter().map(|i| i.f_cnt).collect();
    assert_eq!(f_cnts, vec![10, 11]);

    // Test Update
    let mut updated = second.clone();
    updated.retry_count = 1;
    let updated = queue.update_device_queue_item(updated).await.unwrap();
    assert_eq!(updated.retry_count, 1);
    assert_eq!(updated.frm_payload, second.frm_payload);
    assert!(updated.updated_at >= second.updated_at);

    // Test Delete
    queue.delete_device_queue_item(first.id).await.unwrap();
    assert!(queue.get_device_queue_item(first.id).await.unwrap().is_none());
    assert!(matches!(
        queue.delete_device_queue_item(first.id).await,
        Err(DomainError::DeviceQueueItemNotFound(_))
    ));

    // Test Flush
    queue.flush_device_queue_for_dev_eui(&DEV_EUI).await.unwrap();
    assert!(queue
        .get_next_device_queue_item_for_dev_eui(&DEV_EUI)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_dev_nonce_must_increase() {
    let (_container, client) = setup_test_db().await;
    let activations = PostgresDeviceActivationRepository::new(client);

    activations.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, 10).await.unwrap();
    activations.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, 11).await.unwrap();

    for replayed in [11, 3] {
        let result = activations.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, replayed).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidDevNonce { dev_nonce, .. }) if dev_nonce == replayed
        ));
    }

    // nonces are tracked per JoinEUI
    let other_join_eui = Eui64([0xaa; 8]);
    activations
        .validate_dev_nonce(&other_join_eui, &DEV_EUI, 1)
        .await
        .unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_device_activation_history() {
    let (_container, client) = setup_test_db().await;
    let activations = PostgresDeviceActivationRepository::new(client);

    assert!(activations
        .get_last_device_activation_for_dev_eui(&DEV_EUI)
        .await
        .unwrap()
        .is_none());

    for (dev_nonce, dev_addr) in [(1, [0x26, 0, 0, 1]), (2, [0x26, 0, 0, 2])] {
        activations
            .create_device_activation(CreateDeviceActivationInput {
                dev_eui: DEV_EUI,
                join_eui: JOIN_EUI,
                dev_addr: DevAddr(dev_addr),
                nwk_s_key: Aes128Key([0x11; 16]),
                dev_nonce,
            })
            .await
            .unwrap();
    }

    let last = activations
        .get_last_device_activation_for_dev_eui(&DEV_EUI)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.dev_addr, DevAddr([0x26, 0, 0, 2]));
    assert_eq!(last.dev_nonce, 2);
    assert_eq!(last.nwk_s_key, Aes128Key([0x11; 16]));
    assert_eq!(last.join_eui, JOIN_EUI);
}
