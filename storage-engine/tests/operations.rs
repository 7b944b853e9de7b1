// SPDX-License-Identifier: GPL-3.0-only

mod common;

use std::sync::Arc;

use storage_contracts::RunEvent;
use storage_engine::jobs::{CopyBlocksJob, WriteDataJob, snapshot};
use storage_engine::{
    JobError, Operation, OperationStack, PartitionTableBackend, RunOutcome, SfdiskBackend, ops, shared,
};
use storage_testing::{ScriptedTransport, TransportCall};
use storage_types::{
    CommandRequest, CommandResult, CopyEndpoint, Device, DeviceKind, FileSystemKind, Partition, Report,
};
use tokio::sync::mpsc::unbounded_channel;

use common::{Harness, drain, harness};

fn gpt_disk() -> (ScriptedTransport, Harness) {
    let transport = ScriptedTransport::new();
    transport.respond_output("sfdisk", "label: gpt\ndevice: /dev/sda\nunit: sectors\n");
    let h = harness(Arc::new(transport.clone()));
    (transport, h)
}

fn disk() -> Device {
    Device::new("/dev/sda", DeviceKind::Disk, 1 << 24)
}

fn backend() -> Arc<dyn PartitionTableBackend> {
    Arc::new(SfdiskBackend::new())
}

fn run(h: &Harness, operations: Vec<Operation>) -> (RunOutcome, Vec<RunEvent>, Report) {
    let mut stack = OperationStack::new();
    for op in operations {
        stack.push(op);
    }
    let (tx, mut rx) = unbounded_channel();
    let mut runner = h.engine.runner(stack, tx);
    runner.set_report(Report::new("Apply pending operations"));
    let result = runner.spawn().expect("spawn").join().expect("join");
    (result.outcome, drain(&mut rx), result.report)
}

#[test]
fn create_file_system_formats_then_checks() {
    let (transport, h) = gpt_disk();
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 206847));

    let op = ops::create_file_system(&partition, h.engine.registry(), FileSystemKind::Xfs);
    assert_eq!(op.num_jobs(), 2);
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(
        transport.command_lines(),
        ["mkfs.xfs -f /dev/sda1", "xfs_repair -v /dev/sda1"]
    );
    assert_eq!(snapshot(&partition).file_system, FileSystemKind::Xfs);
}

#[test]
fn growing_changes_geometry_before_the_file_system() {
    let (transport, h) = gpt_disk();
    let partition =
        shared(Partition::new("/dev/sda1", 1, 2048, 4095).with_file_system(FileSystemKind::Ext4));

    let op = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 2048, 8191)
        .expect("valid geometry");
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(
        transport.command_lines(),
        [
            "e2fsck -f -y -v /dev/sda1",
            "sfdisk --dump /dev/sda",
            "sfdisk --force --no-reread -N 1 /dev/sda",
            "partx --update /dev/sda",
            "resize2fs /dev/sda1 3072K",
            "e2fsck -f -y -v /dev/sda1",
        ]
    );

    let script = transport.calls().into_iter().find_map(|call| match call {
        TransportCall::Start(CommandRequest { args, input, .. }) if args.contains(&"-N".to_string()) => {
            input
        }
        _ => None,
    });
    assert_eq!(script.as_deref(), Some(&b"2048,6144\n"[..]));

    let p = snapshot(&partition);
    assert_eq!((p.first_sector, p.last_sector), (2048, 8191));
}

#[test]
fn shrinking_changes_the_file_system_first() {
    let (transport, h) = gpt_disk();
    let partition =
        shared(Partition::new("/dev/sda1", 1, 2048, 8191).with_file_system(FileSystemKind::Ext4));

    let op = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 2048, 4095)
        .expect("valid geometry");
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    let lines = transport.command_lines();
    assert_eq!(lines[1], "resize2fs /dev/sda1 1024K");
    assert_eq!(lines[3], "sfdisk --force --no-reread -N 1 /dev/sda");
    assert_eq!(snapshot(&partition).last_sector, 4095);
}

#[test]
fn unsupported_shrink_fails_before_touching_the_table() {
    let (transport, h) = gpt_disk();
    let partition =
        shared(Partition::new("/dev/sda1", 1, 2048, 1050623).with_file_system(FileSystemKind::Xfs));

    let op = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 2048, 526335)
        .expect("valid geometry");
    let (outcome, _, report) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Error);
    assert_eq!(transport.command_lines(), ["xfs_repair -v /dev/sda1"]);
    assert_eq!(snapshot(&partition).last_sector, 1050623);

    let failing = report.first_error().expect("error");
    assert!(failing.lines.iter().any(|l| l.contains("not supported for xfs")));
}

#[test]
fn moving_copies_the_data_and_relays_progress() {
    let (transport, h) = gpt_disk();
    transport.set_copy_progress(vec![40, 80, 100]);
    let partition =
        shared(Partition::new("/dev/sda2", 2, 4096, 8191).with_file_system(FileSystemKind::Ext4));

    let op = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 10240, 14335)
        .expect("valid geometry");
    let (outcome, events, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert!(transport.calls().iter().any(|call| matches!(
        call,
        TransportCall::CopyBlocks { source, target, .. }
            if source.contains("/dev/sda") && target.contains("/dev/sda")
    )));

    let copy_progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress { job: 1, percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(copy_progress, [40, 80, 100]);

    let p = snapshot(&partition);
    assert_eq!((p.first_sector, p.last_sector), (10240, 14335));
}

#[test]
fn unreadable_device_fails_geometry_changes() {
    let transport = ScriptedTransport::new();
    transport.fail("sfdisk", 1);
    let h = harness(Arc::new(transport.clone()));
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 4095));

    let op = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 2048, 8191)
        .expect("valid geometry");
    let (outcome, _, report) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Error);
    let failing = report.first_error().expect("error");
    assert!(failing.lines.iter().any(|l| {
        l.contains("Could not open device /dev/sda while trying to change partition /dev/sda1")
    }));
    assert_eq!(snapshot(&partition).last_sector, 4095);
}

#[test]
fn logical_volumes_are_resized_with_lvm() {
    let transport = ScriptedTransport::new();
    let h = harness(Arc::new(transport.clone()));
    let vg = Device::new("/dev/vg0", DeviceKind::Lvm, 1 << 24);
    let mut lv = Partition::new("/dev/vg0/data", 1, 0, 2047);
    lv.lv_path = Some("/dev/vg0/data".to_string());
    let partition = shared(lv);

    let op = ops::resize(&vg, &partition, h.engine.registry(), &backend(), 0, 4095)
        .expect("valid geometry");
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert!(
        transport
            .command_lines()
            .contains(&"lvm lvresize --force --size 2097152B /dev/vg0/data".to_string())
    );
}

#[test]
fn inverted_geometry_is_refused_before_anything_runs() {
    let (transport, h) = gpt_disk();
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 4095).with_file_system(FileSystemKind::Ext4));

    let err = ops::resize(&disk(), &partition, h.engine.registry(), &backend(), 8191, 2048).unwrap_err();

    assert!(matches!(err, JobError::InvalidRequest(_)));
    assert!(err.to_string().contains("/dev/sda1"));
    assert!(transport.calls().is_empty());
    assert_eq!(snapshot(&partition).first_sector, 2048);
}

#[test]
fn copy_onto_a_smaller_partition_is_refused() {
    let (transport, h) = gpt_disk();
    let source = shared(Partition::new("/dev/sda1", 1, 2048, 8191).with_file_system(FileSystemKind::Ext4));
    let target = shared(Partition::new("/dev/sdb1", 1, 2048, 4095));

    let err = ops::copy_partition(&source, &target, h.engine.registry()).unwrap_err();

    assert_eq!(
        err,
        JobError::InvalidRequest("/dev/sdb1 is too small to hold a copy of /dev/sda1".to_string())
    );
    assert!(transport.calls().is_empty());
}

#[test]
fn partition_labels_need_gpt() {
    let (transport, h) = gpt_disk();
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 4095));
    let (outcome, _, _) = run(
        &h,
        vec![ops::set_partition_label(&disk(), &partition, &backend(), "root")],
    );
    assert_eq!(outcome, RunOutcome::Finished);
    assert!(
        transport
            .command_lines()
            .contains(&"sfdisk --part-label /dev/sda 1 root".to_string())
    );
    assert_eq!(snapshot(&partition).label, "root");

    let transport = ScriptedTransport::new();
    transport.respond_output("sfdisk", "label: dos\n");
    let h = harness(Arc::new(transport));
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 4095));
    let (outcome, _, _) = run(
        &h,
        vec![ops::set_partition_label(&disk(), &partition, &backend(), "root")],
    );
    assert_eq!(outcome, RunOutcome::Error);
    assert!(snapshot(&partition).label.is_empty());
}

#[test]
fn file_system_labels_respect_the_length_limit() {
    let (transport, h) = gpt_disk();
    let partition =
        shared(Partition::new("/dev/sda1", 1, 2048, 206847).with_file_system(FileSystemKind::Xfs));

    let (outcome, _, _) = run(
        &h,
        vec![ops::set_file_system_label(&partition, h.engine.registry(), "a-label-way-too-long")],
    );
    assert_eq!(outcome, RunOutcome::Error);
    assert!(transport.command_lines().is_empty());

    let (outcome, _, _) = run(
        &h,
        vec![ops::set_file_system_label(&partition, h.engine.registry(), "data")],
    );
    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(
        transport.command_lines(),
        ["xfs_db -x -c sb 0 -c label data /dev/sda1"]
    );
    assert_eq!(snapshot(&partition).file_system_label, "data");
}

#[test]
fn checking_unsupported_file_systems_is_skipped() {
    let (transport, h) = gpt_disk();
    let partition = shared(Partition::new("/dev/sda1", 1, 2048, 4095));

    let (outcome, _, report) = run(&h, vec![ops::check(&partition, h.engine.registry())]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert!(transport.command_lines().is_empty());
    assert!(report.to_text().contains("not supported, skipped"));
}

#[test]
fn copied_partition_takes_over_the_file_system() {
    let (transport, h) = gpt_disk();
    let mut source = Partition::new("/dev/sda1", 1, 2048, 4095).with_file_system(FileSystemKind::Ext4);
    source.file_system_label = "home".to_string();
    let source = shared(source);
    let target = shared(Partition::new("/dev/sdb1", 1, 2048, 8191));

    let op = ops::copy_partition(&source, &target, h.engine.registry()).expect("target is large enough");
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    let copied = snapshot(&target);
    assert_eq!(copied.file_system, FileSystemKind::Ext4);
    assert_eq!(copied.file_system_label, "home");
    assert_eq!(
        transport.command_lines(),
        [
            "e2fsck -f -y -v /dev/sda1",
            "e2fsck -f -y -v /dev/sdb1",
            "resize2fs /dev/sdb1 3072K",
        ]
    );
}

#[test]
fn logical_volumes_are_deactivated() {
    let transport = ScriptedTransport::new();
    let h = harness(Arc::new(transport.clone()));
    let vg = Device::new("/dev/vg0", DeviceKind::Lvm, 1 << 24);

    let (outcome, _, _) = run(
        &h,
        vec![
            ops::deactivate_logical_volumes(&vg, vec!["/dev/vg0/a".into(), "/dev/vg0/b".into()]),
            ops::deactivate_logical_volumes(&vg, Vec::new()),
        ],
    );

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(
        transport.command_lines(),
        [
            "lvm lvchange --activate n /dev/vg0/a",
            "lvm lvchange --activate n /dev/vg0/b",
            "lvm vgchange --activate n vg0",
        ]
    );
}

#[test]
fn failed_lvm_command_stops_the_run() {
    let transport = ScriptedTransport::new();
    transport.respond("lvm", CommandResult::completed(5, b"Logical volume in use".to_vec(), true));
    let h = harness(Arc::new(transport.clone()));
    let vg = Device::new("/dev/vg0", DeviceKind::Lvm, 1 << 24);

    let (outcome, _, report) = run(
        &h,
        vec![ops::deactivate_logical_volumes(
            &vg,
            vec!["/dev/vg0/a".into(), "/dev/vg0/b".into()],
        )],
    );

    assert_eq!(outcome, RunOutcome::Error);
    assert_eq!(transport.command_lines().len(), 1);
    assert!(report.to_text().contains("Logical volume in use"));
}

#[test]
fn raw_jobs_capture_and_write_buffers() {
    let h = harness(Arc::new(storage_testing::LoopbackTransport::new()));
    let device = storage_testing::ScratchDevice::zeroed(8192).expect("scratch");
    let sink = Arc::new(std::sync::Mutex::new(Vec::new()));

    let op = Operation::new("Write and read back", vec![device.node()])
        .with_job(WriteDataJob::new(b"GPT header".to_vec(), device.node(), 512))
        .with_job(
            CopyBlocksJob::new(
                CopyEndpoint::path(device.path(), 512, 10),
                CopyEndpoint::buffer_target(0),
            )
            .capture_into(sink.clone()),
        );
    let (outcome, _, _) = run(&h, vec![op]);

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(sink.lock().expect("sink").as_slice(), b"GPT header");
}
