//! Payload types named in the adder schema.

use hippo_types::{B64Bytes, WideString, wire_object};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointX {
    pub x: i32,
    pub y: i32,
}

wire_object!(PointX { x, y });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraQuadrilateralX {
    pub top_left: PointX,
    pub top_right: PointX,
    pub bottom_left: PointX,
    pub bottom_right: PointX,
}

wire_object!(CameraQuadrilateralX {
    top_left,
    top_right,
    bottom_left,
    bottom_right,
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraKeystoneX {
    pub enabled: bool,
    pub value: CameraQuadrilateralX,
}

wire_object!(CameraKeystoneX { enabled, value });

/// A counted byte buffer nested in an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataWithB64Bytes {
    pub counter: i32,
    pub hidden_b64bytes: B64Bytes,
}

wire_object!(DataWithB64Bytes {
    counter,
    hidden_b64bytes,
});

/// A counted wide string nested in an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataWithWcharptr {
    pub counter: i32,
    pub hidden_wcharptr: WideString,
}

wire_object!(DataWithWcharptr {
    counter,
    hidden_wcharptr,
});

#[cfg(test)]
mod tests {
    use super::*;
    use hippo_types::{Wire, WireError};
    use serde_json::json;

    #[test]
    fn test_keystone_wire_shape() {
        let keystone = CameraKeystoneX {
            enabled: true,
            value: CameraQuadrilateralX {
                top_left: PointX { x: 14, y: 15 },
                top_right: PointX { x: 16, y: 17 },
                bottom_left: PointX { x: 10, y: 11 },
                bottom_right: PointX { x: 12, y: 13 },
            },
        };
        let value = keystone.to_wire().unwrap();
        assert_eq!(value["value"]["bottom_right"], json!({"x": 12, "y": 13}));
        assert_eq!(value["enabled"], json!(true));
        assert_eq!(CameraKeystoneX::from_wire(&value).unwrap(), keystone);
    }

    #[test]
    fn test_nested_buffers() {
        let data = DataWithB64Bytes {
            counter: 3,
            hidden_b64bytes: B64Bytes::new(vec![1, 2, 3]),
        };
        assert_eq!(
            data.to_wire().unwrap(),
            json!({"counter": 3, "hidden_b64bytes": "AQID"})
        );

        let text = DataWithWcharptr::from_wire(&json!({
            "counter": 2,
            "hidden_wcharptr": "\u{1f412}"
        }))
        .unwrap();
        assert_eq!(text.hidden_wcharptr.len(), 2);
    }

    #[test]
    fn test_point_out_of_range() {
        let err = PointX::from_wire(&json!({"x": 1, "y": 4_294_967_296_i64})).unwrap_err();
        assert_eq!(err, WireError::OutOfRange("i32"));
    }
}
