//! A stand-in REPRL target for the runner crate's integration tests.
//!
//! Speaks the same wire protocol a real instrumented Lua interpreter
//! would (§4.11): `HELO` handshake, then repeated `cexe` rounds reading
//! a script off the data-in fd and writing a 4-byte status word back.
//! Doesn't embed an actual Lua interpreter — scripts here are just a
//! handful of literal trigger strings the tests assert against:
//!
//! * `return 42`     -> exits with status 42, no signal
//! * anything containing `CRASH` -> reports a crash signal before dying
//! * anything containing `HANG`  -> spins forever, forcing the parent's
//!   timeout/respawn path
//! * anything else -> exits 0, with coverage bits derived from the
//!   script's bytes so repeated submissions of the same script hit the
//!   same edges (what `compute_aspect_intersection` relies on to
//!   stabilize).

use std::io::{Read, Write};
use std::os::fd::FromRawFd;
use std::fs::File;

const CHILD_CONTROL_IN_FD: i32 = 100;
const CHILD_CONTROL_OUT_FD: i32 = 101;
const CHILD_DATA_IN_FD: i32 = 102;
const CHILD_SHM_FD: i32 = 103;
const NUM_EDGES: u32 = 65536;

fn edges_for(script: &[u8]) -> Vec<u32> {
    // Not a real coverage signal, just a handful of bytes-derived edge
    // indices that are stable across repeated runs of the same script.
    let mut edges = Vec::new();
    let mut acc: u32 = 2166136261; // fnv-ish seed, any fixed constant works
    for &byte in script {
        acc = (acc ^ byte as u32).wrapping_mul(16777619);
        edges.push(acc % NUM_EDGES);
    }
    edges.sort_unstable();
    edges.dedup();
    edges
}

struct Shm {
    mmap: memmap2::MmapMut,
}

impl Shm {
    fn open() -> Self {
        let file = unsafe { File::from_raw_fd(CHILD_SHM_FD) };
        let mut mmap = unsafe { memmap2::MmapMut::map_mut(&file).expect("map shared coverage region") };
        mmap[0..4].copy_from_slice(&NUM_EDGES.to_le_bytes());
        std::mem::forget(file); // fd 103 stays valid for the mapping's lifetime
        Shm { mmap }
    }

    fn clear(&mut self) {
        let bytes = (NUM_EDGES.div_ceil(8)) as usize;
        self.mmap[4..4 + bytes].fill(0);
    }

    fn set(&mut self, edges: &[u32]) {
        for &edge in edges {
            let byte = 4 + (edge / 8) as usize;
            self.mmap[byte] |= 1 << (edge % 8);
        }
    }
}

fn status_word(exit_code: u8, signal: u8) -> [u8; 4] {
    (((exit_code as u32) << 8) | signal as u32).to_le_bytes()
}

fn main() {
    let mut control_in = unsafe { File::from_raw_fd(CHILD_CONTROL_IN_FD) };
    let mut control_out = unsafe { File::from_raw_fd(CHILD_CONTROL_OUT_FD) };
    let mut data_in = unsafe { File::from_raw_fd(CHILD_DATA_IN_FD) };
    let mut shm = Shm::open();

    let mut helo = [0u8; 4];
    control_in.read_exact(&mut helo).expect("read HELO");
    assert_eq!(&helo, b"HELO");
    control_out.write_all(b"HELO").expect("echo HELO");

    loop {
        let mut command = [0u8; 4];
        if control_in.read_exact(&mut command).is_err() {
            return; // parent closed the pipe, shut down quietly
        }
        assert_eq!(&command, b"cexe");

        let mut len_bytes = [0u8; 8];
        control_in.read_exact(&mut len_bytes).expect("read script length");
        let len = u64::from_le_bytes(len_bytes) as usize;
        let mut script = vec![0u8; len];
        data_in.read_exact(&mut script).expect("read script body");

        shm.clear();

        if contains(&script, b"HANG") {
            loop {
                std::thread::sleep(std::time::Duration::from_secs(3600));
            }
        }

        if contains(&script, b"CRASH") {
            shm.set(&edges_for(&script));
            control_out.write_all(&status_word(0, 11)).expect("report crash status");
            control_out.flush().ok();
            std::process::exit(134); // SIGABRT-equivalent exit, parent already has the status word
        }

        let exit_code = if script == b"return 42" { 42 } else { 0 };
        shm.set(&edges_for(&script));
        control_out.write_all(&status_word(exit_code, 0)).expect("report status");
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
