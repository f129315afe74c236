use md5::{Digest, Md5};

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Size of the blocks fed to the hasher.
pub const DIGEST_BLOCK_SIZE: usize = 65536;

/// MD5 of everything `reader` yields, as uppercase hex.
pub fn md5_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut block = vec![0_u8; DIGEST_BLOCK_SIZE];

    loop {
        let read = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&block[..read]);
    }

    Ok(hex::encode_upper(hasher.finalize()))
}

/// MD5 of a file, read block by block.
pub fn md5_file(path: impl AsRef<Path>) -> io::Result<String> {
    md5_reader(File::open(path)?)
}
