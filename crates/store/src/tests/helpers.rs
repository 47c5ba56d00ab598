use std::fs;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;

pub fn count_files_with_ext(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|x| x == ext)
                .unwrap_or(false)
        })
        .count()
}

pub fn count_data_files(dir: &Path) -> usize {
    count_files_with_ext(dir, "data")
}

pub fn count_hint_files(dir: &Path) -> usize {
    count_files_with_ext(dir, "hint")
}

pub fn flip_last_byte(path: &Path) {
    let mut data = fs::read(path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    fs::write(path, &data).unwrap();
}

/// Flips the last byte through a positional write, leaving the inode in
/// place — safe to use while an open store still holds a mapping of the
/// file.
pub fn flip_last_byte_in_place(path: &Path) {
    let file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let len = file.metadata().unwrap().len();
    let mut b = [0u8; 1];
    file.read_exact_at(&mut b, len - 1).unwrap();
    b[0] ^= 0xFF;
    file.write_all_at(&b, len - 1).unwrap();
}

pub fn remove_hint_files(dir: &Path) {
    for entry in fs::read_dir(dir).unwrap().flatten() {
        let p = entry.path();
        if p.extension().and_then(|s| s.to_str()) == Some("hint") {
            fs::remove_file(&p).unwrap();
        }
    }
}
