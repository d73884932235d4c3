//! Integration tests for device proxies against an in-process SoHal
//!
//! These tests cover method naming, typed decoding, error pass-through,
//! notification dispatch and resubscription after a dropped connection.

#![allow(clippy::float_cmp)] // Exact float comparisons are intentional in tests

use std::time::Duration;

use hippo_device::{Device, SoHal, SwDeviceClient, TouchMat};
use hippo_rpc::ConnectionConfig;
use hippo_rpc::testing::{MockSohal, Reply};
use hippo_types::{
    ActiveArea, ActivePenRange, ConnectedDevice, DeviceEvent, ErrorKind, Facility, LogInfo,
    Params, SoHalNotification, TempSensor, TouchMatNotification, TouchMatPoint, TouchMatState,
};
use serde_json::json;
use tokio::sync::mpsc;

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification timed out")
        .expect("channel closed")
}

async fn nothing<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    let got = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(got.is_err(), "unexpected notification: {got:?}");
}

/// Subscribe and forward every notification into a channel
async fn subscribed(touchmat: &TouchMat) -> mpsc::UnboundedReceiver<TouchMatNotification> {
    let (tx, rx) = mpsc::unbounded_channel();
    touchmat
        .subscribe(move |n: &TouchMatNotification| {
            let _ = tx.send(n.clone());
        })
        .await
        .unwrap();
    rx
}

#[tokio::test]
async fn test_method_names_and_params() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@1.open", |_| Reply::Result(json!(1)));
    mock.on("touchmat@1.active_pen_range", |_| Reply::Result(json!("ten_mm")));

    let touchmat = TouchMat::with_config(mock.config(), 1);
    assert_eq!(touchmat.target(), "touchmat@1");
    assert_eq!(touchmat.open().await.unwrap(), 1);
    touchmat
        .set_active_pen_range(ActivePenRange::TenMm)
        .await
        .unwrap();

    let calls = mock.calls();
    assert_eq!(calls[0].method, "touchmat@1.open");
    assert_eq!(calls[0].params, None);
    assert_eq!(calls[1].method, "touchmat@1.active_pen_range");
    assert_eq!(calls[1].params, Some(json!(["ten_mm"])));
}

#[tokio::test]
async fn test_get_set_confirmed() {
    let mock = MockSohal::start().await;
    // Echo the argument when given, otherwise report a default area
    mock.on("touchmat@0.active_area", |params| {
        Reply::Result(params.first().cloned().unwrap_or_else(|| {
            json!({
                "enabled": false,
                "top_left": {"x": 0, "y": 0},
                "bottom_right": {"x": 15360, "y": 8640}
            })
        }))
    });

    let touchmat = TouchMat::with_config(mock.config(), 0);
    let area = touchmat.active_area().await.unwrap();
    assert!(!area.enabled);
    assert_eq!(area.bottom_right, TouchMatPoint { x: 15360, y: 8640 });

    let wanted = ActiveArea {
        enabled: true,
        top_left: TouchMatPoint { x: 100, y: 200 },
        bottom_right: TouchMatPoint { x: 1000, y: 2000 },
    };
    assert_eq!(touchmat.set_active_area_confirmed(&wanted).await.unwrap(), wanted);
    touchmat.set_active_area(&wanted).await.unwrap();
}

#[tokio::test]
async fn test_common_operations() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@0.info", |_| {
        Reply::Result(json!({
            "fw_version": "1.2.3",
            "name": "HP TouchMat",
            "serial": "SN123",
            "index": 0,
            "vendor_id": 1008,
            "product_id": 1316
        }))
    });
    mock.on("touchmat@0.is_device_connected", |_| Reply::Result(json!(true)));
    mock.on("touchmat@0.close", |_| Reply::Result(json!(0)));
    mock.on("touchmat@0.factory_default", |_| Reply::Result(json!(null)));
    mock.on("touchmat@0.temperatures", |_| {
        Reply::Result(json!([
            {"current": 30.5, "device": "projector@0", "max": 90.0, "safe": 80.0, "sensor_name": "led"}
        ]))
    });

    let touchmat = TouchMat::with_config(mock.config(), 0);
    let info = touchmat.info().await.unwrap();
    assert_eq!(info.serial, "SN123");
    assert_eq!(info.vendor_id, 1008);
    assert!(touchmat.is_device_connected().await.unwrap());
    assert_eq!(touchmat.close().await.unwrap(), 0);
    touchmat.factory_default().await.unwrap();

    let temperatures = touchmat.temperatures().await.unwrap();
    assert_eq!(temperatures.len(), 1);
    assert_eq!(temperatures[0].current, 30.5);
    assert_eq!(temperatures[0].sensor, TempSensor::Led);
    assert_eq!(
        temperatures[0].device.connected_device,
        ConnectedDevice::Projector
    );
}

#[tokio::test]
async fn test_type_mismatch_is_message_error() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@0.state", |_| Reply::Result(json!({"touch": "yes"})));
    mock.on("touchmat@0.active_pen_range", |_| Reply::Result(json!("thirty_mm")));

    let touchmat = TouchMat::with_config(mock.config(), 0);
    let err = touchmat.state().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MessageError));
    assert_eq!(err.facility(), Some(Facility::TouchMat));

    let err = touchmat.active_pen_range().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MessageError));
}

#[tokio::test]
async fn test_server_error_passes_through() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@0.palm_rejection_timeout", |_| {
        Reply::Error(0x0000_004f_213e_0204)
    });

    let touchmat = TouchMat::with_config(mock.config(), 0);
    let err = touchmat.set_palm_rejection_timeout(5).await.unwrap_err();
    assert_eq!(err.raw(), 0x0000_004f_213e_0204);
    assert_eq!(err.kind(), Some(ErrorKind::ParamOutOfRange));
    assert_eq!(err.facility_name(), "touchmat");
}

#[tokio::test]
async fn test_unencodable_value_is_invalid_param() {
    let mock = MockSohal::start().await;
    let device: Device<DeviceEvent> = Device::new(mock.config(), "projector", 0, Facility::Projector);

    let err = device.set("brightness", &f64::NAN).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidParam));
    assert_eq!(err.facility(), Some(Facility::Projector));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_unreachable_sohal_is_open_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let touchmat = TouchMat::with_config(ConnectionConfig::new("127.0.0.1", port), 0);
    let err = touchmat.open().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Open));
    assert_eq!(err.raw(), 0x213e_020b);
}

#[tokio::test]
async fn test_timeout_then_recover() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@0.calibrate", |_| Reply::Silent);
    mock.on("touchmat@0.open_count", |_| Reply::Result(json!(4)));

    let touchmat = TouchMat::with_config(mock.config(), 0);
    let err = touchmat
        .call_with_timeout::<()>("calibrate", Params::new(), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    assert_eq!(touchmat.open_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_subscribe_and_receive() {
    let mock = MockSohal::start().await;
    let touchmat = TouchMat::with_config(mock.config(), 0);
    let mut events = subscribed(&touchmat).await;
    assert_eq!(mock.subscriptions("touchmat@0"), 1);
    assert!(touchmat.is_subscribed());

    mock.notify("touchmat", "state", Some(json!({"touch": true, "active_pen": true})));
    mock.notify("touchmat", "palm_rejection_timeout", Some(json!(300)));
    mock.notify("touchmat", "open_count", Some(json!(2)));

    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::State(TouchMatState {
            touch: true,
            active_pen: true
        })
    );
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::PalmRejectionTimeout(300)
    );
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::Device(DeviceEvent::OpenCount(2))
    );
}

#[tokio::test]
async fn test_unknown_and_malformed_pushes_are_dropped() {
    let mock = MockSohal::start().await;
    let touchmat = TouchMat::with_config(mock.config(), 0);
    let mut events = subscribed(&touchmat).await;

    mock.notify("touchmat", "levitate", None);
    mock.notify("touchmat", "active_pen_range", Some(json!("thirty_mm")));
    mock.notify("touchmat", "reset", None);

    assert_eq!(next(&mut events).await, TouchMatNotification::Reset);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let mock = MockSohal::start().await;
    let touchmat = TouchMat::with_config(mock.config(), 0);
    let mut events = subscribed(&touchmat).await;

    assert_eq!(touchmat.unsubscribe().await.unwrap(), 0);
    assert!(!touchmat.is_subscribed());

    mock.notify("touchmat", "calibrate", None);
    nothing(&mut events).await;
}

#[tokio::test]
async fn test_resubscribe_after_connection_loss() {
    let mock = MockSohal::start().await;
    let touchmat = TouchMat::with_config(mock.config(), 0);
    let mut events = subscribed(&touchmat).await;

    mock.disconnect_all();
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::Device(DeviceEvent::SohalDisconnected)
    );
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::Device(DeviceEvent::SohalConnected)
    );
    assert_eq!(mock.call_count("touchmat@0.subscribe"), 2);

    mock.notify("touchmat", "device_palm_rejection", Some(json!(true)));
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::DevicePalmRejection(true)
    );
}

#[tokio::test]
async fn test_resubscribe_retries_until_sohal_is_back() {
    let mock = MockSohal::start().await;
    let touchmat = TouchMat::with_config(mock.config(), 0);
    let mut events = subscribed(&touchmat).await;

    mock.refuse_connections(true);
    mock.disconnect_all();
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::Device(DeviceEvent::SohalDisconnected)
    );
    nothing(&mut events).await;
    assert!(!touchmat.is_connected().await);

    mock.refuse_connections(false);
    assert_eq!(
        next(&mut events).await,
        TouchMatNotification::Device(DeviceEvent::SohalConnected)
    );
    assert!(touchmat.is_connected().await);
}

#[tokio::test]
async fn test_unsubscribed_handle_reconnects_lazily() {
    let mock = MockSohal::start().await;
    mock.on("touchmat@0.open_count", |_| Reply::Result(json!(1)));
    let touchmat = TouchMat::with_config(mock.config(), 0);
    touchmat.connect().await.unwrap();
    mock.wait_for_sessions(1).await;

    mock.disconnect_all();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!touchmat.is_connected().await);
    assert_eq!(mock.call_count("touchmat@0.subscribe"), 0);

    assert_eq!(touchmat.open_count().await.unwrap(), 1);
    assert!(touchmat.is_connected().await);
}

#[tokio::test]
async fn test_sohal_proxy() {
    let mock = MockSohal::start().await;
    mock.on("sohal@0.version", |_| Reply::Result(json!("1.9.3")));
    mock.on("sohal@0.log", |params| {
        Reply::Result(params.first().cloned().unwrap_or(json!({"level": 1})))
    });
    mock.on("sohal@0.exit", |_| Reply::Result(json!(null)));

    let sohal = SoHal::with_config(mock.config());
    assert_eq!(sohal.target(), "sohal@0");
    assert_eq!(sohal.version().await.unwrap(), "1.9.3");
    assert_eq!(sohal.log().await.unwrap(), LogInfo { level: 1 });
    assert_eq!(
        sohal.set_log_confirmed(&LogInfo { level: 3 }).await.unwrap(),
        LogInfo { level: 3 }
    );
    sohal.exit().await.unwrap();
}

#[tokio::test]
async fn test_sohal_notifications() {
    let mock = MockSohal::start().await;
    let sohal = SoHal::with_config(mock.config());
    let (tx, mut events) = mpsc::unbounded_channel();
    sohal
        .subscribe(move |n: &SoHalNotification| {
            let _ = tx.send(n.clone());
        })
        .await
        .unwrap();

    mock.notify("sohal", "log", Some(json!({"level": 4})));
    mock.notify("sohal", "exit", None);
    assert_eq!(
        next(&mut events).await,
        SoHalNotification::Log(LogInfo { level: 4 })
    );
    assert_eq!(next(&mut events).await, SoHalNotification::Exit);
}

#[tokio::test]
async fn test_sw_device_client_without_device() {
    let mock = MockSohal::start().await;
    let client = SwDeviceClient::new(mock.config(), "adder", 0);

    let err = client
        .call::<i32>("slow_call", Params::new().with(&1i32).unwrap(), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::FuncNotAvailable));
    assert_eq!(mock.calls()[0].method, "adder@0.slow_call");
}
