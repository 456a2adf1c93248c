//! End-to-end filesystem overlay scenarios.

use std::sync::Arc;

use parking_lot::RwLock;
use weir_core::Cid;
use weir_fs::{Filesystem, FsError, FsNodeKind, OpenMode};
use weir_proto::DagNode;
use weir_store::{DagService, MemDagStore};

fn filesystem() -> (Arc<MemDagStore>, Filesystem) {
    let dag = Arc::new(MemDagStore::new());
    let fs = Filesystem::new(Arc::clone(&dag) as Arc<dyn DagService>);
    (dag, fs)
}

/// Resolves `path` by walking the committed DAG from `root_cid`.
fn resolve_node(dag: &MemDagStore, root_cid: Cid, path: &[&str]) -> DagNode {
    let mut node = dag.get(&root_cid).unwrap();
    for &part in path {
        let link = node
            .link(part)
            .unwrap_or_else(|| panic!("missing link {part}"))
            .clone();
        node = dag.get(&link.cid).unwrap();
    }
    node
}

#[test]
fn test_create_write_flush() {
    let (dag, fs) = filesystem();
    let published = Arc::new(RwLock::new(Vec::new()));
    let sink = Arc::clone(&published);
    let root = fs
        .new_root("home", Some(Box::new(move |cid| sink.write().push(cid))))
        .unwrap();

    root.mkdir("/a").unwrap();
    let file = root
        .open("/a/b", OpenMode::WRITE | OpenMode::CREATE)
        .unwrap();
    file.write(b"buffered bytes").unwrap();

    let root_cid = root.flush("/a/b").unwrap();
    assert_eq!(root_cid, *published.read().last().unwrap());

    // The published root must name a DAG whose path-resolved /a/b bytes
    // equal what was written.
    let stored = resolve_node(&dag, root_cid, &["a", "b"]);
    assert_eq!(&stored.node_data().unwrap().content[..], b"buffered bytes");
}

#[test]
fn test_open_without_create_fails_on_fresh_root() {
    let (_, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    assert!(matches!(
        root.open("/missing", OpenMode::READ),
        Err(FsError::NotFound)
    ));
}

#[test]
fn test_open_requires_directory_components() {
    let (_, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    let file = root.open("/f", OpenMode::CREATE).unwrap();
    file.write(b"x").unwrap();
    file.flush().unwrap();

    // A file cannot serve as an intermediate path component.
    assert!(matches!(
        root.open("/f/inner", OpenMode::CREATE),
        Err(FsError::NotDirectory(_))
    ));
}

#[test]
fn test_list_paths() {
    let (_, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    root.mkdir("/docs").unwrap();
    root.mkdir("/docs/old").unwrap();
    let file = root.open("/docs/readme", OpenMode::CREATE).unwrap();
    file.flush().unwrap();

    let mut names = root.list("/docs").unwrap();
    names.sort();
    assert_eq!(names, vec!["old", "readme"]);

    assert!(matches!(root.list("/nope"), Err(FsError::NotFound)));
}

#[test]
fn test_rename_within_directory() {
    let (dag, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    let file = root.open("/draft", OpenMode::CREATE).unwrap();
    file.write(b"text").unwrap();
    root.rename("/draft", "/final").unwrap();

    assert_eq!(root.list("/").unwrap(), vec!["final"]);

    let root_cid = root.flush("/").unwrap();
    let stored = resolve_node(&dag, root_cid, &["final"]);
    assert_eq!(&stored.node_data().unwrap().content[..], b"text");
}

#[test]
fn test_rename_across_directories() {
    let (dag, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    root.mkdir("/src").unwrap();
    root.mkdir("/dst").unwrap();
    let file = root.open("/src/item", OpenMode::CREATE).unwrap();
    file.write(b"moved").unwrap();

    root.rename("/src/item", "/dst/item").unwrap();

    assert!(root.list("/src").unwrap().is_empty());
    assert_eq!(root.list("/dst").unwrap(), vec!["item"]);

    let stored = resolve_node(&dag, root.root_cid(), &["dst", "item"]);
    assert_eq!(&stored.node_data().unwrap().content[..], b"moved");
}

#[test]
fn test_unlink_path() {
    let (dag, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    root.mkdir("/a").unwrap();
    root.mkdir("/a/b").unwrap();
    root.unlink("/a/b").unwrap();

    assert!(root.list("/a").unwrap().is_empty());
    assert!(matches!(root.unlink("/a/b"), Err(FsError::NotFound)));

    // The committed tree no longer exposes the removed entry.
    let a_node = resolve_node(&dag, root.root_cid(), &["a"]);
    assert!(!a_node.has_link("b"));
}

#[test]
fn test_node_kinds_via_path() {
    let (_, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    root.mkdir("/d").unwrap();
    let file = root.open("/d/f", OpenMode::CREATE).unwrap();
    file.flush().unwrap();

    assert_eq!(root.node_at("/d").unwrap().kind(), FsNodeKind::Directory);
    assert_eq!(root.node_at("/d/f").unwrap().kind(), FsNodeKind::File);
    assert_eq!(root.node_at("/").unwrap().kind(), FsNodeKind::Directory);
}

#[test]
fn test_reopen_published_root() {
    let (dag, fs) = filesystem();
    let root = fs.new_root("first", None).unwrap();

    root.mkdir("/notes").unwrap();
    let file = root.open("/notes/today", OpenMode::CREATE).unwrap();
    file.write(b"remember").unwrap();
    let cid = root.flush("/notes/today").unwrap();

    // A second filesystem over the same DAG store resumes the tree at
    // the published address.
    let fs2 = Filesystem::new(Arc::clone(&dag) as Arc<dyn DagService>);
    let reopened = fs2.open_root("second", cid, None).unwrap();
    let file = reopened.open("/notes/today", OpenMode::READ).unwrap();
    assert_eq!(&file.read().unwrap()[..], b"remember");
}

#[test]
fn test_writes_are_buffered_until_flush() {
    let (dag, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();

    let file = root.open("/lazy", OpenMode::CREATE).unwrap();
    file.write(b"pending").unwrap();

    // Nothing was flushed: the committed root still has no entry.
    let committed = dag.get(&root.root_cid()).unwrap();
    assert!(!committed.has_link("lazy"));

    file.flush().unwrap();
    let committed = dag.get(&root.root_cid()).unwrap();
    assert!(committed.has_link("lazy"));
}

#[test]
fn test_concurrent_sibling_mutations() {
    let (_, fs) = filesystem();
    let root = fs.new_root("home", None).unwrap();
    root.mkdir("/left").unwrap();
    root.mkdir("/right").unwrap();

    let left = root.node_at("/left").unwrap();
    let right = root.node_at("/right").unwrap();
    let (left, right) = match (left, right) {
        (weir_fs::FsNode::Dir(l), weir_fs::FsNode::Dir(r)) => (l, r),
        _ => panic!("expected directories"),
    };

    // Mutations in sibling subtrees may race; propagation serializes at
    // the shared ancestors.
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dir = if i % 2 == 0 {
                Arc::clone(&left)
            } else {
                Arc::clone(&right)
            };
            std::thread::spawn(move || dir.mkdir(&format!("child-{i}")).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(root.list("/left").unwrap().len(), 4);
    assert_eq!(root.list("/right").unwrap().len(), 4);
}
