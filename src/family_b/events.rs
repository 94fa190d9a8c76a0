//! Family B unsolicited frames: `9A kk 01 value`

use super::{request, CLASS_NOTIFY, REPLY_BIT};
use crate::events::{BandEvent, CallAction, CameraAction, FindPhoneAction, MusicAction, Signature};

const NOTIFY: u8 = CLASS_NOTIFY | REPLY_BIT;

fn find_phone(value: u8) -> Option<BandEvent> {
    match value {
        0x00 => Some(BandEvent::FindPhone(FindPhoneAction::Stop)),
        0x01 => Some(BandEvent::FindPhone(FindPhoneAction::Start)),
        _ => None,
    }
}

fn camera(value: u8) -> Option<BandEvent> {
    match value {
        0x01 => Some(BandEvent::Camera(CameraAction::Open)),
        0x02 => Some(BandEvent::Camera(CameraAction::Capture)),
        0x03 => Some(BandEvent::Camera(CameraAction::Close)),
        _ => None,
    }
}

fn camera_ack(value: u8) -> Option<Vec<u8>> {
    matches!(value, 0x01 | 0x03).then(|| request(CLASS_NOTIFY, 0x02, &[value]))
}

fn music(value: u8) -> Option<BandEvent> {
    let action = match value {
        0x01 => MusicAction::Play,
        0x02 => MusicAction::Pause,
        0x03 => MusicAction::Next,
        0x04 => MusicAction::Previous,
        0x05 => MusicAction::VolumeUp,
        0x06 => MusicAction::VolumeDown,
        _ => return None,
    };
    Some(BandEvent::Music(action))
}

fn call(value: u8) -> Option<BandEvent> {
    match value {
        0x01 => Some(BandEvent::Call(CallAction::Answer)),
        0x02 => Some(BandEvent::Call(CallAction::End)),
        _ => None,
    }
}

pub static SIGNATURES: &[Signature] = &[
    Signature {
        name: "find phone",
        prefix: &[NOTIFY, 0x01, 0x01],
        trailer: None,
        min_len: 4,
        value_at: 3,
        decode: find_phone,
        ack: None,
    },
    Signature {
        name: "camera",
        prefix: &[NOTIFY, 0x02, 0x01],
        trailer: None,
        min_len: 4,
        value_at: 3,
        decode: camera,
        ack: Some(camera_ack),
    },
    Signature {
        name: "music",
        prefix: &[NOTIFY, 0x03, 0x01],
        trailer: None,
        min_len: 4,
        value_at: 3,
        decode: music,
        ack: None,
    },
    Signature {
        name: "call",
        prefix: &[NOTIFY, 0x04, 0x01],
        trailer: None,
        min_len: 4,
        value_at: 3,
        decode: call,
        ack: None,
    },
];

#[cfg(test)]
mod tests {
    use crate::command::Effects;
    use crate::events::*;
    use crate::types::{Family, Request};

    fn classify(frame: &[u8]) -> (Option<&'static str>, Effects) {
        let mut fx = Effects::new();
        let name = EventClassifier::for_family(Family::B).classify(frame, &mut fx);
        (name, fx)
    }

    #[test]
    fn test_find_phone_stop() {
        let (name, fx) = classify(&[0x9A, 0x01, 0x01, 0x00]);
        assert_eq!(name, Some("find phone"));
        assert_eq!(fx.events, vec![BandEvent::FindPhone(FindPhoneAction::Stop)]);
    }

    #[test]
    fn test_camera_close_is_acked() {
        let (_, fx) = classify(&[0x9A, 0x02, 0x01, 0x03]);
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Close)]);
        assert_eq!(
            fx.requests,
            vec![Request::control_unacked(vec![0x1A, 0x02, 0x01, 0x03])]
        );
    }

    #[test]
    fn test_camera_capture_not_acked() {
        let (_, fx) = classify(&[0x9A, 0x02, 0x01, 0x02]);
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Capture)]);
        assert!(fx.requests.is_empty());
    }

    #[test]
    fn test_music_volume() {
        assert_eq!(
            classify(&[0x9A, 0x03, 0x01, 0x06]).1.events,
            vec![BandEvent::Music(MusicAction::VolumeDown)]
        );
    }

    #[test]
    fn test_unmatched() {
        // Request echo, unknown value, short frame
        assert_eq!(classify(&[0x1A, 0x02, 0x01, 0x01]).0, None);
        assert_eq!(classify(&[0x9A, 0x04, 0x01, 0x09]).0, None);
        assert_eq!(classify(&[0x9A, 0x01, 0x01]).0, None);
    }
}
