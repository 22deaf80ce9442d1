use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn write_combined_dump(path: &std::path::Path) {
    let mut f = fs::File::create(path).unwrap();
    writeln!(f, "cn: Bob Jones").unwrap();
    writeln!(f, "distinguishedName: CN=Bob Jones,OU=Staff,DC=corp,DC=local").unwrap();
    writeln!(f, "objectClass: person").unwrap();
    writeln!(f, "objectClass: user").unwrap();
    writeln!(f, "memberOf: CN=Finance,OU=Groups,DC=corp,DC=local").unwrap();
    writeln!(f, "memberOf: CN=IT,OU=Groups,DC=corp,DC=local").unwrap();
    writeln!(f, "userAccountControl: 512").unwrap();
    writeln!(f, "--------------------").unwrap();
    writeln!(f, "cn: FILESRV01").unwrap();
    writeln!(f, "distinguishedName: CN=FILESRV01,OU=Servers,DC=corp,DC=local").unwrap();
    writeln!(f, "objectClass: computer").unwrap();
    writeln!(f, "operatingSystem: Windows Server 2019").unwrap();
    writeln!(f, "userAccountControl: 4096").unwrap();
    writeln!(f, "--------------------").unwrap();
    writeln!(f, "cn: Alice Smith").unwrap();
    writeln!(f, "distinguishedName: CN=Alice Smith,OU=Staff,DC=corp,DC=local").unwrap();
    writeln!(f, "objectClass: person").unwrap();
    writeln!(f, "objectClass: user").unwrap();
    writeln!(f, "memberOf: CN=Domain Admins,CN=Users,DC=corp,DC=local").unwrap();
    writeln!(f, "logonCount: 3").unwrap();
}

#[test]
fn e2e_ingests_and_writes_documents() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    write_combined_dump(&dump);

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f").arg(&dump).arg("-D").arg(&vault).arg("--append");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Object Inventory"));

    assert!(vault.join("USERS").join("Alice Smith.md").exists());
    assert!(vault.join("USERS").join("Bob Jones.md").exists());
    assert!(vault.join("COMPUTERS").join("FILESRV01.md").exists());

    let alice = fs::read_to_string(vault.join("USERS").join("Alice Smith.md")).unwrap();
    assert!(alice.contains("#IsAdmin"));
    assert!(alice.contains("#LowLogonCount"));
    assert!(alice.contains("[[Domain Admins]]"));

    let bob = fs::read_to_string(vault.join("USERS").join("Bob Jones.md")).unwrap();
    assert!(bob.contains("[[Finance]]"));
    assert!(bob.contains("[[UserAccountControlValues#ADS_UF_NORMAL_ACCOUNT]]"));
    assert!(!bob.contains("#IsAdmin"));
}

#[test]
fn append_rerun_is_idempotent_on_disk() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    write_combined_dump(&dump);

    for _ in 0..2 {
        let mut cmd = Command::cargo_bin("shihtzu").unwrap();
        cmd.arg("-f")
            .arg(&dump)
            .arg("-D")
            .arg(&vault)
            .arg("--append")
            .arg("-q");
        cmd.assert().success();
    }
    let first = fs::read_to_string(vault.join("USERS").join("Alice Smith.md")).unwrap();

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f")
        .arg(&dump)
        .arg("-D")
        .arg(&vault)
        .arg("--append")
        .arg("-q");
    cmd.assert().success();
    let third = fs::read_to_string(vault.join("USERS").join("Alice Smith.md")).unwrap();
    assert_eq!(first, third);
}

#[test]
fn user_defined_content_survives_append() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    write_combined_dump(&dump);

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f").arg(&dump).arg("-D").arg(&vault).arg("--append").arg("-q");
    cmd.assert().success();

    // Analyst appends notes under the User Defined section
    let alice_path = vault.join("USERS").join("Alice Smith.md");
    let mut doc = fs::read_to_string(&alice_path).unwrap();
    doc.push_str("suspected service account\nfollow up with IT\n");
    fs::write(&alice_path, &doc).unwrap();

    // Next capture carries an extra attribute
    let mut f = fs::OpenOptions::new().append(true).open(&dump).unwrap();
    writeln!(f, "--------------------").unwrap();
    writeln!(f, "cn: Alice Smith").unwrap();
    writeln!(f, "objectClass: person").unwrap();
    writeln!(f, "objectClass: user").unwrap();
    writeln!(f, "description: rotated password on site").unwrap();
    drop(f);

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f").arg(&dump).arg("-D").arg(&vault).arg("--append").arg("-q");
    cmd.assert().success();

    let merged = fs::read_to_string(&alice_path).unwrap();
    assert!(merged.contains("suspected service account"));
    assert!(merged.contains("follow up with IT"));
    assert!(merged.contains("description: rotated password on site"));
    // The original raw lines are still there exactly once
    assert_eq!(merged.matches("cn: Alice Smith").count(), 1);
}

#[test]
fn partitioned_inputs_force_classification() {
    let tmp = tempdir().unwrap();
    let users = tmp.path().join("users.txt");
    let groups = tmp.path().join("groups.txt");
    let vault = tmp.path().join("vault");
    fs::write(&users, "cn: Bare User\n").unwrap();
    fs::write(&groups, "cn: Bare Group\n").unwrap();

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-U")
        .arg(&users)
        .arg("-G")
        .arg(&groups)
        .arg("-D")
        .arg(&vault)
        .arg("-q");
    cmd.assert().success();
    assert!(vault.join("USERS").join("Bare User.md").exists());
    assert!(vault.join("GROUPS").join("Bare Group.md").exists());
}

#[test]
fn skip_mode_preserves_existing_documents() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    write_combined_dump(&dump);
    let alice_path = vault.join("USERS").join("Alice Smith.md");
    fs::create_dir_all(alice_path.parent().unwrap()).unwrap();
    fs::write(&alice_path, "analyst-owned scratchpad\n").unwrap();

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f").arg(&dump).arg("-D").arg(&vault).arg("-q");
    cmd.assert().success();

    assert_eq!(
        fs::read_to_string(&alice_path).unwrap(),
        "analyst-owned scratchpad\n"
    );
    // objects without an existing document are still created
    assert!(vault.join("USERS").join("Bob Jones.md").exists());
}

#[test]
fn missing_input_file_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f")
        .arg(tmp.path().join("missing.txt"))
        .arg("-D")
        .arg(tmp.path().join("vault"));
    cmd.assert().failure();
}

#[test]
fn combined_and_typed_inputs_are_mutually_exclusive() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    write_combined_dump(&dump);
    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f")
        .arg(&dump)
        .arg("-U")
        .arg(&dump)
        .arg("-D")
        .arg(tmp.path().join("vault"));
    cmd.assert().failure();
}

#[test]
fn export_writes_object_index_csv() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    let exports = tmp.path().join("exports");
    write_combined_dump(&dump);

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f")
        .arg(&dump)
        .arg("-D")
        .arg(&vault)
        .arg("--export")
        .arg(&exports)
        .arg("-q");
    cmd.assert().success();

    let files: Vec<_> = fs::read_dir(&exports).unwrap().flatten().collect();
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(files[0].path()).unwrap();
    assert!(content.starts_with("kind,name,identity,tags"));
    assert!(content.contains("computer,FILESRV01"));
}

#[test]
fn mmap_threshold_and_parallel_ingest_work() {
    let tmp = tempdir().unwrap();
    let dump = tmp.path().join("export.txt");
    let vault = tmp.path().join("vault");
    write_combined_dump(&dump);

    let mut cmd = Command::cargo_bin("shihtzu").unwrap();
    cmd.arg("-f")
        .arg(&dump)
        .arg("-D")
        .arg(&vault)
        .arg("--mmap-threshold")
        .arg("32")
        .arg("--parallel")
        .arg("-q");
    cmd.assert().success();
    assert!(vault.join("USERS").join("Alice Smith.md").exists());
    assert!(vault.join("COMPUTERS").join("FILESRV01.md").exists());
}
