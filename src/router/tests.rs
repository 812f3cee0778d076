//! Tests for the message router
//!
//! These run the whole inbound path end to end: envelope in, registry and
//! mirror mutation, frames captured from the outbound channel.

use super::*;
use crate::accessory::BridgeContext;
use crate::framework::local::LocalFramework;
use serde_json::json;
use tokio::sync::mpsc;

struct Harness {
    router: MessageRouter,
    registry: Arc<AccessoryRegistry>,
    framework: LocalFramework,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    fn new() -> Self {
        let outbound = Outbound::new();
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.attach(tx);

        let ctx = Arc::new(BridgeContext::new(outbound.clone()));
        let framework = LocalFramework::new();
        let registry = AccessoryRegistry::new(Arc::new(framework.clone()), ctx);
        let router = MessageRouter::new(registry.clone(), outbound);
        Self {
            router,
            registry,
            framework,
            rx,
        }
    }

    fn send(&self, frame: Value) {
        self.router.handle_message(&frame.to_string());
    }

    fn recv(&mut self) -> Value {
        let frame = self.rx.try_recv().expect("expected an outbound frame");
        serde_json::from_str(&frame).unwrap()
    }

    fn recv_none(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "expected no further outbound frames"
        );
    }

    fn add_lamp(&mut self, name: &str) {
        self.send(json!({"topic": "add", "payload": {
            "name": name, "service": "Lightbulb", "Brightness": "default"
        }}));
        // ack + metadata-defaults ack
        self.recv();
        self.recv();
    }
}

#[tokio::test]
async fn test_add_acks_and_applies_metadata_defaults() {
    let mut h = Harness::new();
    h.send(json!({"topic": "add", "payload": {"name": "Lamp1", "service": "Lightbulb"}}));

    let ack = h.recv();
    assert_eq!(ack["topic"], "response");
    assert_eq!(ack["payload"]["ack"], true);
    assert_eq!(ack["payload"]["message"], "accessory 'Lamp1' is added.");

    let info_ack = h.recv();
    assert_eq!(info_ack["payload"]["ack"], true);
    assert_eq!(
        info_ack["payload"]["message"],
        "accessory 'Lamp1', accessoryinformation is set."
    );

    let info = h.registry.get("Lamp1").unwrap().info();
    assert_eq!(info.manufacturer.as_deref(), Some("accessory-gw"));
    assert!(info.model.unwrap().starts_with('v'));
    assert!(info.serial_number.is_some());
}

#[tokio::test]
async fn test_duplicate_add_rejected_first_device_intact() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");
    h.framework
        .write_characteristic("Lamp1", CharacteristicId::On, json!(true));
    h.rx.try_recv().ok(); // drop the forwarded command

    h.send(json!({"topic": "add", "payload": {"name": "Lamp1", "service": "Switch"}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "name 'Lamp1' is already used.");

    let lamp = h.registry.get("Lamp1").unwrap();
    assert_eq!(lamp.service().name(), "Lightbulb");
    assert_eq!(lamp.value(CharacteristicId::On), Some(json!(true)));
}

#[tokio::test]
async fn test_add_unknown_service_rejected() {
    let mut h = Harness::new();
    h.send(json!({"topic": "add", "payload": {"name": "T1", "service": "Toaster"}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "service 'Toaster' undefined.");
    assert!(h.registry.get("T1").is_none());
}

#[tokio::test]
async fn test_set_out_of_range_rejected_and_state_unchanged() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "Brightness", "value": 150
    }}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "value '150' outside range");

    let lamp = h.registry.get("Lamp1").unwrap();
    assert_eq!(lamp.value(CharacteristicId::Brightness), None);
}

#[tokio::test]
async fn test_remote_set_coerces_on_and_produces_no_outbound() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "On", "value": 1
    }}));

    let lamp = h.registry.get("Lamp1").unwrap();
    assert_eq!(lamp.value(CharacteristicId::On), Some(json!(true)));
    assert_eq!(
        lamp.label(CharacteristicId::On).unwrap().trigger,
        Trigger::Websocket
    );
    // Loop prevention: the framework's change notification came back
    // tagged as a remote echo, so nothing goes out - not even an ack
    h.recv_none();
}

#[tokio::test]
async fn test_validation_chain_order() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    // Unknown device wins over unknown characteristic
    h.send(json!({"topic": "set", "payload": {
        "name": "Nope", "characteristic": "Bogus", "value": 1
    }}));
    assert_eq!(h.recv()["payload"]["message"], "name 'Nope' undefined.");

    // Unknown characteristic wins over missing value
    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "Bogus"
    }}));
    assert_eq!(
        h.recv()["payload"]["message"],
        "characteristic 'Bogus' undefined."
    );

    // Missing value wins over not-exposed
    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "TargetPosition", "value": null
    }}));
    assert_eq!(
        h.recv()["payload"]["message"],
        "name 'Lamp1' value undefined."
    );

    // Recognized characteristic the service does not expose
    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "TargetPosition", "value": 10
    }}));
    assert_eq!(
        h.recv()["payload"]["message"],
        "name 'Lamp1' characteristic do not match."
    );
}

#[tokio::test]
async fn test_callback_stores_silently() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    h.send(json!({"topic": "callback", "payload": {
        "name": "Lamp1", "characteristic": "Brightness", "value": 40
    }}));

    let lamp = h.registry.get("Lamp1").unwrap();
    assert_eq!(lamp.value(CharacteristicId::Brightness), Some(json!(40)));
    // No label, no framework notification, no frames
    assert!(lamp.label(CharacteristicId::Brightness).is_none());
    h.recv_none();
}

#[tokio::test]
async fn test_get_unknown_name() {
    let mut h = Harness::new();
    h.send(json!({"topic": "get", "payload": {"name": "Lamp2"}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "name 'Lamp2' undefined.");
}

#[tokio::test]
async fn test_get_single_and_all() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");
    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "Brightness", "value": 60
    }}));

    h.send(json!({"topic": "get", "payload": {"name": "Lamp1"}}));
    let snapshot = h.recv();
    assert_eq!(snapshot["topic"], "accessories");
    let lamp = &snapshot["payload"]["Lamp1"];
    assert_eq!(lamp["service"], "Lightbulb");
    assert_eq!(lamp["characteristics"]["Brightness"], 60);
    // Never-set values appear as the placeholder
    assert_eq!(lamp["characteristics"]["On"], "blank");
    assert!(lamp["serialnumber"].is_string());

    // "all" omits per-device serial numbers
    h.send(json!({"topic": "get", "payload": {}}));
    let all = h.recv();
    assert!(all["payload"]["Lamp1"].get("serialnumber").is_none());
}

#[tokio::test]
async fn test_remove_reports_identity() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    h.send(json!({"topic": "remove", "payload": {"name": "Lamp1"}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], true);
    assert_eq!(ack["payload"]["message"], "accessory 'Lamp1' is removed.");
    assert!(ack["payload"]["serialnumber"].is_string());
    assert!(ack["payload"]["service"].is_string());
    assert!(h.registry.get("Lamp1").is_none());
    assert!(h.framework.device("Lamp1").is_none());

    h.send(json!({"topic": "remove", "payload": {"name": "Lamp1"}}));
    assert_eq!(
        h.recv()["payload"]["message"],
        "accessory 'Lamp1' not found."
    );
}

#[tokio::test]
async fn test_set_accessories_updates_metadata() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    h.send(json!({"topic": "setAccessories", "payload": {
        "name": "Lamp1", "manufacturer": "Acme", "serialnumber": "SN-1"
    }}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], true);
    assert_eq!(
        ack["payload"]["message"],
        "accessory 'Lamp1', accessoryinformation is set."
    );
    let info = h.registry.get("Lamp1").unwrap().info();
    assert_eq!(info.manufacturer.as_deref(), Some("Acme"));
    assert_eq!(info.serial_number.as_deref(), Some("SN-1"));

    h.send(json!({"topic": "setAccessories", "payload": {"name": "Lamp2"}}));
    assert_eq!(
        h.recv()["payload"]["message"],
        "accessory 'Lamp2' undefined."
    );
}

#[tokio::test]
async fn test_unknown_topic() {
    let mut h = Harness::new();
    h.send(json!({"topic": "reboot", "payload": {}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "topic 'reboot' unknown.");
}

#[tokio::test]
async fn test_framework_write_forwards_command() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    // Local user flips the switch: forwarded immediately, not debounced
    h.framework
        .write_characteristic("Lamp1", CharacteristicId::On, json!(1));

    let cmd = h.recv();
    assert_eq!(cmd["topic"], "set");
    assert_eq!(cmd["payload"]["name"], "Lamp1");
    assert_eq!(cmd["payload"]["characteristic"], "On");
    assert_eq!(cmd["payload"]["value"], true);
    assert_eq!(cmd["payload"]["Service"], "Lightbulb");
    assert!(cmd["payload"]["Model"].is_string());

    let lamp = h.registry.get("Lamp1").unwrap();
    assert_eq!(
        lamp.label(CharacteristicId::On).unwrap().trigger,
        Trigger::Homekit
    );
}

#[tokio::test(start_paused = true)]
async fn test_framework_brightness_writes_debounce_to_last() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    for v in [10, 20, 30] {
        h.framework
            .write_characteristic("Lamp1", CharacteristicId::Brightness, json!(v));
        tokio::time::advance(std::time::Duration::from_millis(50)).await;
    }
    tokio::time::advance(crate::debounce::QUIET_WINDOW).await;
    tokio::task::yield_now().await;

    let cmd = h.recv();
    assert_eq!(cmd["topic"], "set");
    assert_eq!(cmd["payload"]["value"], 30);
    h.recv_none();
}

#[tokio::test]
async fn test_framework_read_notifies_and_answers_from_cache() {
    let mut h = Harness::new();
    h.add_lamp("Lamp1");

    // Never set: no value comes back, but the remote side still hears
    // about the read
    let answer = h
        .framework
        .read_characteristic("Lamp1", CharacteristicId::Brightness);
    assert_eq!(answer, None);

    let notification = h.recv();
    assert_eq!(notification["topic"], "get");
    assert_eq!(notification["payload"]["name"], "Lamp1");
    assert_eq!(notification["payload"]["characteristic"], "Brightness");
    assert_eq!(notification["payload"]["Service"], "Lightbulb");

    h.send(json!({"topic": "set", "payload": {
        "name": "Lamp1", "characteristic": "Brightness", "value": 70
    }}));
    let answer = h
        .framework
        .read_characteristic("Lamp1", CharacteristicId::Brightness);
    assert_eq!(answer, Some(json!(70)));
}

#[tokio::test]
async fn test_malformed_frames_ignored() {
    let mut h = Harness::new();
    h.router.handle_message("");
    h.router.handle_message("not json");
    h.recv_none();

    // Parseable envelope, wrong payload shape
    h.send(json!({"topic": "add", "payload": {"service": "Lightbulb"}}));
    let ack = h.recv();
    assert_eq!(ack["payload"]["ack"], false);
    assert_eq!(ack["payload"]["message"], "topic 'add' payload invalid.");
}
