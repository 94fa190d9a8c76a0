//! Family C unsolicited frames: `40 kk 0100 value A5`

use super::{request, CLASS_NOTIFY, MARKER_REPLY};
use crate::events::{BandEvent, CallAction, CameraAction, FindPhoneAction, MusicAction, Signature};

const FRAME_LEN: usize = 6;

fn find_phone(value: u8) -> Option<BandEvent> {
    match value {
        0x00 => Some(BandEvent::FindPhone(FindPhoneAction::Stop)),
        0x01 => Some(BandEvent::FindPhone(FindPhoneAction::Start)),
        _ => None,
    }
}

fn camera(value: u8) -> Option<BandEvent> {
    match value {
        0x00 => Some(BandEvent::Camera(CameraAction::Open)),
        0x01 => Some(BandEvent::Camera(CameraAction::Close)),
        0x02 => Some(BandEvent::Camera(CameraAction::Capture)),
        _ => None,
    }
}

/// Echo with the request marker
fn camera_ack(value: u8) -> Option<Vec<u8>> {
    matches!(value, 0x00 | 0x01).then(|| request(CLASS_NOTIFY, 0x02, &[value]))
}

fn music(value: u8) -> Option<BandEvent> {
    let action = match value {
        0x00 => MusicAction::PlayPause,
        0x01 => MusicAction::Next,
        0x02 => MusicAction::Previous,
        0x03 => MusicAction::VolumeUp,
        0x04 => MusicAction::VolumeDown,
        _ => return None,
    };
    Some(BandEvent::Music(action))
}

fn call(value: u8) -> Option<BandEvent> {
    match value {
        0x00 => Some(BandEvent::Call(CallAction::Answer)),
        0x01 => Some(BandEvent::Call(CallAction::End)),
        _ => None,
    }
}

pub static SIGNATURES: &[Signature] = &[
    Signature {
        name: "find phone",
        prefix: &[CLASS_NOTIFY, 0x01, 0x01, 0x00],
        trailer: Some(MARKER_REPLY),
        min_len: FRAME_LEN,
        value_at: 4,
        decode: find_phone,
        ack: None,
    },
    Signature {
        name: "camera",
        prefix: &[CLASS_NOTIFY, 0x02, 0x01, 0x00],
        trailer: Some(MARKER_REPLY),
        min_len: FRAME_LEN,
        value_at: 4,
        decode: camera,
        ack: Some(camera_ack),
    },
    Signature {
        name: "music",
        prefix: &[CLASS_NOTIFY, 0x03, 0x01, 0x00],
        trailer: Some(MARKER_REPLY),
        min_len: FRAME_LEN,
        value_at: 4,
        decode: music,
        ack: None,
    },
    Signature {
        name: "call",
        prefix: &[CLASS_NOTIFY, 0x04, 0x01, 0x00],
        trailer: Some(MARKER_REPLY),
        min_len: FRAME_LEN,
        value_at: 4,
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
        let name = EventClassifier::for_family(Family::C).classify(frame, &mut fx);
        (name, fx)
    }

    #[test]
    fn test_camera_open_is_acked() {
        let (name, fx) = classify(&[0x40, 0x02, 0x01, 0x00, 0x00, 0xA5]);
        assert_eq!(name, Some("camera"));
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Open)]);
        assert_eq!(
            fx.requests,
            vec![Request::control_unacked(vec![0x40, 0x02, 0x01, 0x00, 0x00, 0x5A])]
        );
    }

    #[test]
    fn test_camera_capture() {
        let (_, fx) = classify(&[0x40, 0x02, 0x01, 0x00, 0x02, 0xA5]);
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Capture)]);
        assert!(fx.requests.is_empty());
    }

    #[test]
    fn test_find_phone_and_call() {
        assert_eq!(
            classify(&[0x40, 0x01, 0x01, 0x00, 0x01, 0xA5]).1.events,
            vec![BandEvent::FindPhone(FindPhoneAction::Start)]
        );
        assert_eq!(
            classify(&[0x40, 0x04, 0x01, 0x00, 0x00, 0xA5]).1.events,
            vec![BandEvent::Call(CallAction::Answer)]
        );
    }

    #[test]
    fn test_music_play_pause() {
        assert_eq!(
            classify(&[0x40, 0x03, 0x01, 0x00, 0x00, 0xA5]).1.events,
            vec![BandEvent::Music(MusicAction::PlayPause)]
        );
    }

    #[test]
    fn test_wrong_marker_not_classified() {
        // Our own ack going out
        assert_eq!(classify(&[0x40, 0x02, 0x01, 0x00, 0x00, 0x5A]).0, None);
        assert_eq!(classify(&[0x40, 0x03, 0x01, 0x00, 0x07, 0xA5]).0, None);
    }
}
