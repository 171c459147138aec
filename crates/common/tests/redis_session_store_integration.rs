#![cfg(feature = "integration-tests")]

use common::domain::{DeviceSession, DeviceSessionStore, DomainError, RxWindow};
use common::lorawan::{Aes128Key, DevAddr, Eui64, NetId};
use common::redis::{RedisClient, RedisDeviceSessionStore};
use std::collections::HashSet;
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::{REDIS_PORT, Redis};

const DEV_EUI: Eui64 = Eui64([1, 2, 3, 4, 5, 6, 7, 8]);
const NET_ID: NetId = NetId([0x00, 0x00, 0x13]);

async fn setup_test_redis() -> (ContainerAsync<Redis>, RedisClient) {
    let redis = Redis::default().start().await.unwrap();
    let host = redis.get_host().await.unwrap();
    let port = redis.get_host_port_ipv4(REDIS_PORT).await.unwrap();

    let client = RedisClient::new(&format!("redis://{}:{}", host, port))
        .await
        .expect("Failed to create client");
    client.ping().await.expect("Failed to ping redis");

    (redis, client)
}

fn session(dev_addr: DevAddr, f_cnt_down: u32) -> DeviceSession {
    DeviceSession {
        device_profile_id: "dp-1".to_string(),
        service_profile_id: "sp-1".to_string(),
        routing_profile_id: "rp-1".to_string(),
        dev_addr,
        dev_eui: DEV_EUI,
        join_eui: Eui64([9; 8]),
        nwk_s_key: Aes128Key([7; 16]),
        f_cnt_up: 3,
        f_cnt_down,
        rx_window: RxWindow::Rx1,
        rx_delay: 1,
        rx1_dr_offset: 0,
        rx2_dr: 0,
        enabled_channels: vec![0, 1, 2],
        last_rx_info_set: vec![],
        max_supported_dr: 5,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_session_save_and_replace() {
    let (_container, client) = setup_test_redis().await;
    let store = RedisDeviceSessionStore::new(client, Duration::from_secs(60), 16);

    assert!(store.get_device_session(&DEV_EUI).await.unwrap().is_none());

    store
        .save_device_session(&session(DevAddr([0x26, 0, 0, 1]), 1))
        .await
        .unwrap();
    let replacement = session(DevAddr([0x26, 0, 0, 2]), 0);
    store.save_device_session(&replacement).await.unwrap();

    let stored = store.get_device_session(&DEV_EUI).await.unwrap().unwrap();
    assert_eq!(stored, replacement);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_dev_addr_allocation() {
    let (_container, client) = setup_test_redis().await;
    let store = RedisDeviceSessionStore::new(client.clone(), Duration::from_secs(60), 16);

    let mut seen = HashSet::new();
    for _ in 0..32 {
        let dev_addr = store.allocate_dev_addr(&NET_ID, &DEV_EUI).await.unwrap();
        assert_eq!(dev_addr.nwk_id(), NET_ID.nwk_id());
        assert!(seen.insert(dev_addr));
    }

    let exhausted = RedisDeviceSessionStore::new(client, Duration::from_secs(60), 0);
    assert!(matches!(
        exhausted.allocate_dev_addr(&NET_ID, &DEV_EUI).await,
        Err(DomainError::DevAddrAllocationFailed(0))
    ));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_flush_mac_command_queue() {
    let (_container, client) = setup_test_redis().await;
    let store = RedisDeviceSessionStore::new(client.clone(), Duration::from_secs(60), 16);
    let key = format!("lora:ns:device:{}:mac:queue", DEV_EUI);

    let mut conn = client.connection();
    redis::cmd("RPUSH")
        .arg(&key)
        .arg(vec![0x02u8])
        .arg(vec![0x03u8])
        .query_async::<_, i64>(&mut conn)
        .await
        .unwrap();

    store.flush_mac_command_queue(&DEV_EUI).await.unwrap();

    let exists: i64 = redis::cmd("EXISTS")
        .arg(&key)
        .query_async::<_, i64>(&mut conn)
        .await
        .unwrap();
    assert_eq!(exists, 0);

    // flushing an empty queue is not an error
    store.flush_mac_command_queue(&DEV_EUI).await.unwrap();
}
