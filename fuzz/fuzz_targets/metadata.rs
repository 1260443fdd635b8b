#![no_main]

use dotprobe::{file::File, metadata::AssemblyView};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = File::from_mem(data.to_vec()) {
        if let Ok(view) = AssemblyView::new(&file) {
            let _ = view.assembly_name();
            let _ = view.references();
            let _ = view.debuggable();
            let _ = view.target_framework();
        }
        let _ = dotprobe::file::VersionInfo::read(&file);
    }
});
