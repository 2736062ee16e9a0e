use super::{BlockHash, BlockHeight, HeaderBytes, HeaderIndex};

fn with_tmp_db<T>(op: fn(db: HeaderIndex) -> T) {
    let path = tempfile::tempdir().unwrap().into_path();
    let db = HeaderIndex::open(path.clone()).unwrap();

    op(db);

    HeaderIndex::destroy(path).unwrap();
}

fn dummy_header(height: u64) -> (BlockHeight, BlockHash, HeaderBytes) {
    let hash = merit_crypto::hash::Hasher::<256>::hash(height.to_be_bytes().as_slice());
    (height, hash, height.to_be_bytes().to_vec())
}

#[test]
fn test_connect_blackbox() {
    with_tmp_db(|mut db| {
        let (height, hash, header) = dummy_header(11);
        db.connect(height, hash, header.clone()).unwrap();

        let persisted = db.get_header(hash).unwrap().unwrap();
        assert_eq!(persisted, header);

        let (tip_height, tip_hash) = db.find_tip().unwrap().unwrap();
        assert_eq!(tip_height, height);
        assert_eq!(tip_hash, hash);

        let (chain_height, chain_hash) = db.crawl().next().unwrap().unwrap();
        assert_eq!(chain_height, height);
        assert_eq!(chain_hash, hash);
    });
}

#[test]
fn test_disconnect_blackbox() {
    with_tmp_db(|mut db| {
        for i in 0..=5 {
            let (height, hash, header) = dummy_header(i * 10);
            db.connect(height, hash, header).unwrap();
        }

        db.disconnect_above(20).unwrap();

        let (tip_height, _) = db.find_tip().unwrap().unwrap();
        assert_eq!(tip_height, 20);

        let mut chain = db.crawl();

        for i in 0..=2 {
            let (height, _) = chain.next().unwrap().unwrap();
            assert_eq!(height, i * 10);
        }

        assert!(chain.next().is_none());
    });
}

#[test]
fn test_chain_page() {
    with_tmp_db(|mut db| {
        for i in 0..100 {
            let (height, hash, header) = dummy_header(i * 10);
            db.connect(height, hash, header).unwrap();
        }

        let mut chain = db.read_chain_page(200, 15);

        for i in 0..15 {
            let (height, _) = chain.next().unwrap().unwrap();
            assert_eq!(200 + (i * 10), height)
        }

        assert!(chain.next().is_none());
    });
}

#[test]
fn test_chain_contains() {
    with_tmp_db(|mut db| {
        let (height, hash, header) = dummy_header(42);
        db.connect(height, hash, header).unwrap();

        assert!(db.chain_contains(42, &hash).unwrap());
        assert!(!db.chain_contains(43, &hash).unwrap());
    });
}
