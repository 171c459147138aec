use async_trait::async_trait;
use chrono::Utc;
use common::domain::{
    CreateDeviceQueueItemInput, Device, DeviceProfile, DeviceQueueRepository, DeviceSession,
    DeviceSessionStore, DomainError, DomainResult, DownlinkDispatcher, ErrorKind,
    JoinAnsPayload, JoinReqPayload, JoinServerClient, KeyEnvelope, RxInfo, RxPacket,
    ServiceProfile, StaticApplicationServerPool, StaticJoinServerPool,
};
use common::lorawan::{Aes128Key, Eui64, MType, NetId, PhyPayload};
use network_server::domain::{JoinStage, NetworkSettings};
use network_server::{InMemoryStores, NetworkServer, NetworkServerUpstreams};
use std::sync::{Arc, Mutex};

const JOIN_EUI: Eui64 = Eui64([1, 2, 3, 4, 5, 6, 7, 8]);
const DEV_EUI: Eui64 = Eui64([2, 2, 2, 2, 1, 1, 1, 1]);
const NET_ID: NetId = NetId([0x00, 0x00, 0x13]);
const NWK_S_KEY: Aes128Key = Aes128Key([0x42; 16]);

#[derive(Default)]
struct FakeJoinServer {
    requests: Mutex<Vec<JoinReqPayload>>,
}

#[async_trait]
impl JoinServerClient for FakeJoinServer {
    async fn join_request(&self, request: JoinReqPayload) -> DomainResult<JoinAnsPayload> {
        self.requests.lock().unwrap().push(request);

        let mut phy_payload = vec![0x20];
        phy_payload.extend_from_slice(&[0x55; 12]);
        phy_payload.extend_from_slice(&[9, 9, 9, 9]);
        Ok(JoinAnsPayload {
            phy_payload,
            nwk_s_key: KeyEnvelope {
                kek_label: String::new(),
                aes_key: NWK_S_KEY,
            },
        })
    }
}

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<(DeviceSession, PhyPayload)>>,
}

#[async_trait]
impl DownlinkDispatcher for RecordingDispatcher {
    async fn send_join_accept(
        &self,
        session: &DeviceSession,
        phy_payload: PhyPayload,
    ) -> DomainResult<()> {
        self.sent.lock().unwrap().push((session.clone(), phy_payload));
        Ok(())
    }
}

struct Harness {
    server: NetworkServer,
    stores: InMemoryStores,
    join_server: Arc<FakeJoinServer>,
    dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    async fn new() -> Self {
        let stores = InMemoryStores::new();
        stores
            .devices
            .insert_device(Device {
                dev_eui: DEV_EUI,
                device_profile_id: "dp-1".to_string(),
                service_profile_id: "sp-1".to_string(),
                routing_profile_id: "rp-1".to_string(),
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            })
            .await;
        stores
            .devices
            .insert_device_profile(DeviceProfile {
                device_profile_id: "dp-1".to_string(),
                supports_join: true,
                mac_version: "1.0.2".to_string(),
            })
            .await;
        stores
            .devices
            .insert_service_profile(ServiceProfile {
                service_profile_id: "sp-1".to_string(),
                dr_max: 5,
            })
            .await;

        let join_server = Arc::new(FakeJoinServer::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let upstreams = NetworkServerUpstreams::new(
            Arc::new(StaticApplicationServerPool::new()),
            Arc::new(StaticJoinServerPool::with_default(join_server.clone())),
            dispatcher.clone(),
        );
        let settings = NetworkSettings {
            net_id: NET_ID,
            enabled_channels: vec![0, 1, 2, 3, 4, 5, 6, 7],
            ..NetworkSettings::default()
        };
        let server = NetworkServer::new(stores.clone().into(), upstreams, settings);

        Self {
            server,
            stores,
            join_server,
            dispatcher,
        }
    }

    async fn join(&self, dev_nonce: u16) -> DomainResult<network_server::domain::JoinOutcome> {
        self.server
            .join_request_service
            .handle_join_request(&join_request_packet(dev_nonce))
            .await
    }

    fn sent_join_accepts(&self) -> usize {
        self.dispatcher.sent.lock().unwrap().len()
    }
}

fn join_request_packet(dev_nonce: u16) -> RxPacket {
    let mut phy_payload = vec![0x00];
    phy_payload.extend_from_slice(&JOIN_EUI.to_le_bytes());
    phy_payload.extend_from_slice(&DEV_EUI.to_le_bytes());
    phy_payload.extend_from_slice(&dev_nonce.to_le_bytes());
    phy_payload.extend_from_slice(&[1, 2, 3, 4]);

    RxPacket {
        phy_payload,
        rx_info_set: vec![RxInfo {
            mac: Eui64([0xb8, 0x27, 0xeb, 0xff, 0xfe, 0x00, 0x00, 0x01]),
            time: Some(Utc::now()),
            rssi: -72,
            lora_snr: 9.0,
            channel: 2,
            frequency: 868_500_000,
        }],
    }
}

#[tokio::test]
async fn test_join_activates_device() {
    let harness = Harness::new().await;
    harness
        .stores
        .device_queue
        .create_device_queue_item(CreateDeviceQueueItemInput {
            dev_eui: DEV_EUI,
            frm_payload: vec![1, 2, 3],
            f_cnt: 7,
            f_port: 1,
            confirmed: false,
            retry_count: 0,
            emit_at: None,
            forwarded_at: None,
        })
        .await
        .unwrap();
    harness.stores.sessions.push_mac_command(DEV_EUI, vec![0x03]).await;

    let outcome = harness.join(1).await.unwrap();

    let session = harness
        .stores
        .sessions
        .get_device_session(&DEV_EUI)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session, outcome.session);
    assert_eq!(session.dev_addr.nwk_id(), NET_ID.nwk_id());
    assert_eq!(session.nwk_s_key, NWK_S_KEY);
    assert_eq!(session.f_cnt_up, 0);
    assert_eq!(session.f_cnt_down, 0);
    assert_eq!(session.enabled_channels, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(session.last_rx_info_set.len(), 1);
    assert_eq!(session.max_supported_dr, 5);

    assert!(harness
        .stores
        .device_queue
        .get_device_queue_items_for_dev_eui(&DEV_EUI)
        .await
        .unwrap()
        .is_empty());
    assert!(harness.stores.sessions.pending_mac_commands(&DEV_EUI).await.is_empty());

    let activations = harness.stores.activations.activations_for_dev_eui(&DEV_EUI).await;
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].dev_addr, session.dev_addr);
    assert_eq!(activations[0].dev_nonce, 1);

    let requests = harness.join_server.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].base.sender_id, "000013");
    assert_eq!(requests[0].base.receiver_id, JOIN_EUI.to_string());
    assert_eq!(requests[0].dev_addr, session.dev_addr);

    let sent = harness.dispatcher.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dev_eui, DEV_EUI);
    assert_eq!(sent[0].1.mtype(), MType::JoinAccept);
}

#[tokio::test]
async fn test_replayed_dev_nonce_leaves_session_untouched() {
    let harness = Harness::new().await;
    let first = harness.join(5).await.unwrap();

    for dev_nonce in [5, 4] {
        let err = harness.join(dev_nonce).await.unwrap_err();
        match err {
            DomainError::JoinStageFailed { stage, source } => {
                assert_eq!(stage, JoinStage::ValidateDevNonce.name());
                assert!(matches!(*source, DomainError::InvalidDevNonce { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    let session = harness
        .stores
        .sessions
        .get_device_session(&DEV_EUI)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session, first.session);
    assert_eq!(
        harness.stores.activations.activations_for_dev_eui(&DEV_EUI).await.len(),
        1
    );
    assert_eq!(harness.join_server.requests.lock().unwrap().len(), 1);
    assert_eq!(harness.sent_join_accepts(), 1);

    harness.join(6).await.unwrap();
    assert_eq!(
        harness.stores.activations.activations_for_dev_eui(&DEV_EUI).await.len(),
        2
    );
    assert_eq!(harness.sent_join_accepts(), 2);
}

#[tokio::test]
async fn test_concurrent_joins_with_same_dev_nonce() {
    let harness = Harness::new().await;

    let (first, second) = tokio::join!(harness.join(9), harness.join(9));
    let (outcome, err) = match (first, second) {
        (Ok(outcome), Err(err)) | (Err(err), Ok(outcome)) => (outcome, err),
        (first, second) => panic!("expected exactly one join to succeed: {first:?} / {second:?}"),
    };

    assert_eq!(err.kind(), ErrorKind::Validation);
    match err {
        DomainError::JoinStageFailed { stage, source } => {
            assert_eq!(stage, JoinStage::ValidateDevNonce.name());
            assert!(matches!(*source, DomainError::InvalidDevNonce { dev_nonce: 9, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let session = harness
        .stores
        .sessions
        .get_device_session(&DEV_EUI)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session, outcome.session);

    let activations = harness.stores.activations.activations_for_dev_eui(&DEV_EUI).await;
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].dev_addr, session.dev_addr);
    assert_eq!(harness.join_server.requests.lock().unwrap().len(), 1);
    assert_eq!(harness.sent_join_accepts(), 1);
}

#[tokio::test]
async fn test_join_disabled_device_is_rejected() {
    let harness = Harness::new().await;
    harness
        .stores
        .devices
        .insert_device_profile(DeviceProfile {
            device_profile_id: "dp-1".to_string(),
            supports_join: false,
            mac_version: "1.0.2".to_string(),
        })
        .await;

    let err = harness.join(1).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::JoinStageFailed { ref stage, .. } if stage == JoinStage::ResolveDevice.name()
    ));
    assert!(harness.join_server.requests.lock().unwrap().is_empty());
    assert!(harness
        .stores
        .sessions
        .get_device_session(&DEV_EUI)
        .await
        .unwrap()
        .is_none());
}
