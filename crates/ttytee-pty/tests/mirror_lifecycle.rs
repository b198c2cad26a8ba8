//! Mirror creation, publication, recreation and removal

#[cfg(target_os = "linux")]
mod linux_tests {
    use std::fs;
    use ttytee_pty::{create_mirror, remove_mirror, EndpointSet, PtyError, Role};
    use ttytee_test_utils::{read_until, Consumer, FakeTty, TestFixtures, IO_TIMEOUT};

    #[test]
    fn test_published_path_resolves_to_slave() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.pty_path("pty0");

        let mirror = create_mirror(&path, false).expect("create mirror");
        assert_eq!(mirror.role(), Role::Mirror);
        assert_eq!(mirror.path(), path.as_path());

        let target = fs::read_link(&path).unwrap();
        assert_eq!(Some(target.as_path()), mirror.slave());
        assert!(target.starts_with("/dev/pts"));
        assert_eq!(mirror.generation(), 0);
    }

    #[test]
    fn test_slave_is_usable_immediately() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.pty_path("pty0");
        let mirror = create_mirror(&path, false).unwrap();

        let consumer = Consumer::connect(&path).unwrap();

        mirror.write(b"ping").unwrap();
        assert_eq!(consumer.recv(4, IO_TIMEOUT), b"ping");

        consumer.send(b"pong").unwrap();
        assert_eq!(read_until(mirror.file(), 4, IO_TIMEOUT), b"pong");
    }

    #[test]
    fn test_bytes_pass_through_unmodified() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.pty_path("pty0");
        let mirror = create_mirror(&path, false).unwrap();
        let consumer = Consumer::connect(&path).unwrap();

        // No echo, no line buffering, ^C is just a byte
        let payload = [b'a', 0x03, b'b', 0x7f, b'c'];
        mirror.write(&payload).unwrap();
        assert_eq!(consumer.recv(payload.len(), IO_TIMEOUT), payload);
        assert!(read_until(mirror.file(), 1, std::time::Duration::from_millis(100)).is_empty());
    }

    #[test]
    fn test_existing_path_needs_overwrite() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.create_test_file("pty0", b"keep me").unwrap();

        let err = create_mirror(&path, false).unwrap_err();
        assert!(matches!(err, PtyError::AlreadyExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");

        let mirror = create_mirror(&path, true).expect("overwrite");
        assert_eq!(fs::read_link(&path).unwrap().as_path(), mirror.slave().unwrap());
    }

    #[test]
    fn test_recreate_keeps_path() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.pty_path("pty0");
        let mut mirror = create_mirror(&path, false).unwrap();

        let old_slave = mirror.slave().unwrap().to_path_buf();
        Consumer::connect(&path).unwrap().disconnect();

        mirror.recreate().expect("recreate");
        assert_eq!(mirror.generation(), 1);
        assert_eq!(mirror.path(), path.as_path());
        assert_ne!(mirror.slave().unwrap(), old_slave.as_path());
        assert_eq!(fs::read_link(&path).unwrap().as_path(), mirror.slave().unwrap());

        let consumer = Consumer::connect(&path).unwrap();
        mirror.write(b"again").unwrap();
        assert_eq!(consumer.recv(5, IO_TIMEOUT), b"again");
    }

    #[test]
    fn test_remove_mirror_deletes_link() {
        let fixtures = TestFixtures::new().unwrap();
        let path = fixtures.pty_path("pty0");
        let _mirror = create_mirror(&path, false).unwrap();

        remove_mirror(&path).unwrap();
        assert!(fs::symlink_metadata(&path).is_err());
        assert!(remove_mirror(&path).is_err());
    }

    #[test]
    fn test_endpoint_set_slots_follow_path_order() {
        let fixtures = TestFixtures::new().unwrap();
        let tty = FakeTty::new().unwrap();
        let paths = fixtures.pty_paths(3);

        let set = EndpointSet::open(tty.path(), &paths, false).unwrap();
        assert_eq!(set.source().role(), Role::Source);
        assert_eq!(set.source().path(), tty.path());
        assert_eq!(set.len(), 3);
        assert!(!set.is_empty());
        for (slot, path) in paths.iter().enumerate() {
            assert_eq!(set.mirror(slot).unwrap().path(), path.as_path());
        }
    }

    #[test]
    fn test_endpoint_set_cleanup_is_idempotent() {
        let fixtures = TestFixtures::new().unwrap();
        let tty = FakeTty::new().unwrap();
        let paths = fixtures.pty_paths(2);

        let mut set = EndpointSet::open(tty.path(), &paths, false).unwrap();
        assert_eq!(set.cleanup(), 0);
        for path in &paths {
            assert!(fs::symlink_metadata(path).is_err());
        }
        assert_eq!(set.cleanup(), 0);
    }

    #[test]
    fn test_endpoint_set_drop_removes_paths() {
        let fixtures = TestFixtures::new().unwrap();
        let tty = FakeTty::new().unwrap();
        let paths = fixtures.pty_paths(2);

        drop(EndpointSet::open(tty.path(), &paths, false).unwrap());
        for path in &paths {
            assert!(fs::symlink_metadata(path).is_err());
        }
    }

    #[test]
    fn test_failed_startup_removes_earlier_mirrors() {
        let fixtures = TestFixtures::new().unwrap();
        let tty = FakeTty::new().unwrap();
        let first = fixtures.pty_path("pty0");
        let taken = fixtures.create_test_file("pty1", b"occupied").unwrap();

        let err = EndpointSet::open(tty.path(), &[first.clone(), taken.clone()], false).unwrap_err();
        assert!(matches!(err, PtyError::AlreadyExists { .. }));
        assert!(fs::symlink_metadata(&first).is_err());
        assert_eq!(fs::read(&taken).unwrap(), b"occupied");
    }

    #[test]
    fn test_missing_tty_is_fatal() {
        let fixtures = TestFixtures::new().unwrap();
        let paths = fixtures.pty_paths(1);

        let err = EndpointSet::open(fixtures.path().join("no-such-tty"), &paths, false).unwrap_err();
        assert!(matches!(err, PtyError::OpenSource { .. }));
        assert!(fs::symlink_metadata(&paths[0]).is_err());
    }
}
