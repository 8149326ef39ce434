#![no_main]
use bucketvol::modules::config::{parse_u32, BackendConfig};
use bucketvol::modules::mountpoint;
use bucketvol::VolumeOptions;
use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // First line is the volume name, the rest are key=value options
        let mut lines = text.lines();
        let name = lines.next().unwrap_or_default();
        let options: VolumeOptions = lines
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let resource = mountpoint::backing_resource(name, &options);
        let _ = BackendConfig::from_options(&resource, &options);

        let root = Path::new("/mnt/volumes");
        let path = mountpoint::volume_mountpoint(root, name, &options);
        assert!(path.starts_with(root));
        if mountpoint::is_valid_resource(&resource) {
            assert_ne!(mountpoint::resolve(root, &resource), root);
        }

        for value in options.values() {
            let _ = parse_u32(value);
        }
    }
});
