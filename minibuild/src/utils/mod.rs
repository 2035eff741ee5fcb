pub use anyhow::Error;
pub type IResult<T> = anyhow::Result<T>;

mod color_string;
pub use color_string::{Color, WriteColorExt};

mod graph;
pub use graph::{Graph, BitVec};

mod hasher;
pub use hasher::StableHasher;

mod interned_string;
pub use interned_string::InternedString;

pub mod lev_distance;

pub mod paths;

mod shell;
pub use shell::{Shell, ColorChoice, Verbosity};


pub fn minibuild_home() -> IResult<std::path::PathBuf> {
    if let Some(path) = home::home_dir() {
        Ok(path.join(".minibuild"))
    } else {
        anyhow::bail!("Failed to locate minibuild home directory")
    }
}

pub fn hash_u64<H: std::hash::Hash>(value: &H) -> u64 {
    let mut h = StableHasher::new();
    value.hash(&mut h);
    std::hash::Hasher::finish(&h)
}

pub fn to_hex(num: u64) -> String {
    const TABLE: &[u8] = b"0123456789abcdef";
    let mut b = Vec::new();
    for byte in num.to_le_bytes() {
        b.push(TABLE[(byte >> 4) as usize]);
        b.push(TABLE[(byte & 0xf) as usize]);
    }
    // SAFETY: Hex strings are always valid UTF-8
    unsafe { String::from_utf8_unchecked(b) }
}
