use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fs;
use std::path::Path;
use std::process::Command;

fn header_block(seq: u8, last: bool) -> Vec<u8> {
    let mut blk = vec![0u8; 0x8B];
    blk[0] = 0x8B;
    blk[1..9].copy_from_slice(b"BACKUP  ");
    blk[9] = seq;
    blk[0x8A] = if last { 0xFF } else { 0x00 };
    blk
}

fn directory_block(path: &str, entries: u16) -> Vec<u8> {
    let mut blk = vec![0u8; 0x46];
    blk[0] = 0x46;
    blk[1..1 + path.len()].copy_from_slice(path.as_bytes());
    blk[0x40..0x42].copy_from_slice(&entries.to_le_bytes());
    blk
}

fn entry_block(
    name: &str,
    complete: bool,
    final_size: u32,
    fragment: u16,
    offset: u32,
    length: u32,
) -> Vec<u8> {
    let mut blk = vec![0u8; 0x22];
    blk[0] = 0x22;
    blk[1..1 + name.len()].copy_from_slice(name.as_bytes());
    blk[0x0D] = if complete { 0x03 } else { 0x02 };
    blk[0x0E..0x12].copy_from_slice(&final_size.to_le_bytes());
    blk[0x12..0x14].copy_from_slice(&fragment.to_le_bytes());
    blk[0x14..0x18].copy_from_slice(&offset.to_le_bytes());
    blk[0x18..0x1C].copy_from_slice(&length.to_le_bytes());
    blk
}

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

/// Two volumes: A.TXT whole on volume 1, BIG.DAT split 100+150 across both.
/// Returns (A.TXT bytes, BIG.DAT bytes).
fn write_demo_set(set: &Path) -> (Vec<u8>, Vec<u8>) {
    let a_txt = random_bytes(1234, 1);
    let big = random_bytes(250, 2);

    let mut payload1 = a_txt.clone();
    payload1.extend_from_slice(&big[..100]);
    let mut vol1 = header_block(1, false);
    vol1.extend(directory_block("", 2));
    vol1.extend(entry_block("A.TXT", true, 1234, 1, 0, 1234));
    vol1.extend(entry_block("BIG.DAT", false, 250, 1, 1234, 100));
    fs::write(set.join("CONTROL.001"), &vol1).unwrap();
    fs::write(set.join("BACKUP.001"), &payload1).unwrap();

    let mut vol2 = header_block(2, true);
    vol2.extend(directory_block("", 1));
    vol2.extend(entry_block("BIG.DAT", true, 250, 2, 0, 150));
    fs::write(set.join("CONTROL.002"), &vol2).unwrap();
    fs::write(set.join("BACKUP.002"), &big[100..]).unwrap();

    (a_txt, big)
}

#[test]
fn list_then_restore_round_trip() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();
    let (a_txt, big) = write_demo_set(set.path());
    let dest = td.child("out");

    Command::cargo_bin("unback")
        .unwrap()
        .args(["list", "--dir"])
        .arg(set.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("A.TXT"))
        .stdout(predicate::str::contains("BIG.DAT"))
        .stdout(predicate::str::contains("1,234"));

    Command::cargo_bin("unback")
        .unwrap()
        .args(["restore", "--dir"])
        .arg(set.path())
        .arg("--dest")
        .arg(dest.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 file(s)"));

    assert_eq!(fs::read(dest.child("A.TXT").path()).unwrap(), a_txt);
    assert_eq!(fs::read(dest.child("BIG.DAT").path()).unwrap(), big);
}

#[test]
fn second_restore_needs_clobber() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();
    write_demo_set(set.path());
    let dest = td.child("out");

    let run = |extra: &[&str]| {
        let mut cmd = Command::cargo_bin("unback").unwrap();
        cmd.args(["restore", "--dir"])
            .arg(set.path())
            .arg("--dest")
            .arg(dest.path())
            .args(extra);
        cmd
    };

    run(&[]).assert().success();
    run(&[])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--clobber"));
    run(&["--clobber"]).assert().success();
}

#[test]
fn wildcard_selects_by_full_name() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();
    write_demo_set(set.path());
    let dest = td.child("out");

    Command::cargo_bin("unback")
        .unwrap()
        .args(["restore", "--dir"])
        .arg(set.path())
        .arg("--dest")
        .arg(dest.path())
        .args(["--wildcard", "*.TXT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 file(s)"));
    dest.child("A.TXT").assert(predicate::path::is_file());
    dest.child("BIG.DAT").assert(predicate::path::missing());

    // A bare prefix is not a match; the pattern covers the whole name.
    Command::cargo_bin("unback")
        .unwrap()
        .args(["list", "--dir"])
        .arg(set.path())
        .args(["--wildcard", "A"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn json_catalog_parses() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();
    write_demo_set(set.path());

    let out = Command::cargo_bin("unback")
        .unwrap()
        .args(["list", "--json", "--dir"])
        .arg(set.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    let catalog: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let entries = catalog.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["path"], "A.TXT");
    assert_eq!(entries[1]["path"], "BIG.DAT");
    assert_eq!(entries[1]["size"], 250);
}

#[test]
fn explicit_control_files_apply_incrementally() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();
    let (_, big) = write_demo_set(set.path());
    let dest = td.child("out");

    for name in ["CONTROL.001", "CONTROL.002"] {
        Command::cargo_bin("unback")
            .unwrap()
            .args(["restore", "--dest"])
            .arg(dest.path())
            .arg(set.child(name).path())
            .assert()
            .success();
    }
    assert_eq!(fs::read(dest.child("BIG.DAT").path()).unwrap(), big);
}

#[test]
fn volume_gap_fails_the_run() {
    let td = assert_fs::TempDir::new().unwrap();
    let set = td.child("set");
    set.create_dir_all().unwrap();

    let mut vol1 = header_block(1, false);
    vol1.extend(directory_block("", 0));
    fs::write(set.child("CONTROL.001").path(), &vol1).unwrap();
    fs::write(set.child("BACKUP.001").path(), b"").unwrap();
    let mut vol2 = header_block(3, true);
    vol2.extend(directory_block("", 0));
    fs::write(set.child("CONTROL.002").path(), &vol2).unwrap();
    fs::write(set.child("BACKUP.003").path(), b"").unwrap();

    Command::cargo_bin("unback")
        .unwrap()
        .args(["restore", "--dir"])
        .arg(set.path())
        .arg("--dest")
        .arg(td.child("out").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("volume sequence broken"));
}
