#![no_main]
use bucketvol::modules::plugin::{CreateRequest, MountRequest, Response};
use bucketvol::modules::server::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = serde_json::from_slice::<Envelope>(data) {
        let _ = serde_json::from_value::<CreateRequest>(envelope.body.clone());
        let _ = serde_json::from_value::<MountRequest>(envelope.body);
    }

    // Responses must survive a trip through their own encoding
    if let Ok(response) = serde_json::from_slice::<Response>(data) {
        let encoded = serde_json::to_vec(&response).unwrap();
        let decoded: Response = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(response, decoded);
    }
});
