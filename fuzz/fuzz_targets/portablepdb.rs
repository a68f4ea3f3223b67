#![no_main]

use allocscope::metadata::{pdb::PortablePdb, token::Token};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(pdb) = PortablePdb::from_mem(data.to_vec()) {
        for row in 1..=pdb.method_count() as u32 {
            let _ = pdb.sequence_points(Token::method_def(row));
        }
    }
});
