//! Family A unsolicited frames: `07 kk value`

use super::CLASS_NOTIFY;
use crate::events::{BandEvent, CallAction, CameraAction, FindPhoneAction, MusicAction, Signature};

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
        0x01 => Some(BandEvent::Camera(CameraAction::Capture)),
        0x02 => Some(BandEvent::Camera(CameraAction::Close)),
        _ => None,
    }
}

/// Open and close must be confirmed or the band leaves camera mode
fn camera_ack(value: u8) -> Option<Vec<u8>> {
    matches!(value, 0x00 | 0x02).then(|| vec![CLASS_NOTIFY, 0x02, value, 0x00])
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
        prefix: &[CLASS_NOTIFY, 0x01],
        trailer: None,
        min_len: 3,
        value_at: 2,
        decode: find_phone,
        ack: None,
    },
    Signature {
        name: "camera",
        prefix: &[CLASS_NOTIFY, 0x02],
        trailer: None,
        min_len: 3,
        value_at: 2,
        decode: camera,
        ack: Some(camera_ack),
    },
    Signature {
        name: "music",
        prefix: &[CLASS_NOTIFY, 0x03],
        trailer: None,
        min_len: 3,
        value_at: 2,
        decode: music,
        ack: None,
    },
    Signature {
        name: "call",
        prefix: &[CLASS_NOTIFY, 0x04],
        trailer: None,
        min_len: 3,
        value_at: 2,
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
        let name = EventClassifier::for_family(Family::A).classify(frame, &mut fx);
        (name, fx)
    }

    #[test]
    fn test_find_phone() {
        let (name, fx) = classify(&[0x07, 0x01, 0x01]);
        assert_eq!(name, Some("find phone"));
        assert_eq!(fx.events, vec![BandEvent::FindPhone(FindPhoneAction::Start)]);
    }

    #[test]
    fn test_camera_open_is_acked() {
        let (_, fx) = classify(&[0x07, 0x02, 0x00]);
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Open)]);
        assert_eq!(
            fx.requests,
            vec![Request::control_unacked(vec![0x07, 0x02, 0x00, 0x00])]
        );
    }

    #[test]
    fn test_camera_capture_not_acked() {
        let (_, fx) = classify(&[0x07, 0x02, 0x01]);
        assert_eq!(fx.events, vec![BandEvent::Camera(CameraAction::Capture)]);
        assert!(fx.requests.is_empty());
    }

    #[test]
    fn test_music_and_call() {
        assert_eq!(
            classify(&[0x07, 0x03, 0x02]).1.events,
            vec![BandEvent::Music(MusicAction::Previous)]
        );
        assert_eq!(
            classify(&[0x07, 0x04, 0x01]).1.events,
            vec![BandEvent::Call(CallAction::End)]
        );
    }

    #[test]
    fn test_out_of_set_values() {
        assert_eq!(classify(&[0x07, 0x02, 0x07]).0, None);
        assert_eq!(classify(&[0x07, 0x05, 0x00]).0, None);
    }
}
