#![no_main]
use feeder_core::FeedRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any accepted payload must carry a positive rotation count and asOf.
    if let Ok(req) = FeedRequest::from_json(data, 1_700_000_000) {
        assert!(req.rotations > 0);
        assert!(req.as_of > 0);
    }
    let pairs: Vec<(&str, &str)> = data
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .collect();
    if let Ok(req) = FeedRequest::from_form(pairs, 1_700_000_000) {
        assert!(req.rotations > 0);
        assert!(req.as_of > 0);
    }
});
