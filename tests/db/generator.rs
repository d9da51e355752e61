use std::collections::HashSet;
use std::thread;

use qrclaim::codes::MAX_BATCH_QUANTITY;

use crate::common::*;

#[test]
fn test_first_batch_starts_at_serial_one() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    create_test_product_with_id(&conn, 7, company.id, "Apple Gummies", Some("APG"));

    let generated = queries::generate_batch(&mut conn, 7, 3).unwrap();

    assert_eq!(generated.batch.product_id, 7);
    assert_eq!(generated.batch.sequence_no, 1);
    assert_eq!(generated.batch.quantity, 3);
    assert_eq!((generated.batch.serial_start, generated.batch.serial_end), (1, 3));

    let serials: Vec<i64> = generated.codes.iter().map(|c| c.serial).collect();
    assert_eq!(serials, vec![1, 2, 3]);

    let values: HashSet<&str> = generated.codes.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values.len(), 3);

    for code in &generated.codes {
        assert!(code.value.starts_with(&format!("APG-{:04}-", code.serial)), "{}", code.value);
        assert!(!code.is_used);
        assert_eq!(code.batch_id, generated.batch.id);

        // Persisted exactly as returned
        assert_eq!(&code_row(&conn, &code.value), code);
    }
    assert_eq!(count_rows(&conn, "codes"), 3);
}

#[test]
fn test_next_batch_continues_serials() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", Some("APG"));

    queries::generate_batch(&mut conn, product.id, 3).unwrap();
    let second = queries::generate_batch(&mut conn, product.id, 2).unwrap();

    assert_eq!(second.batch.sequence_no, 2);
    assert_eq!((second.batch.serial_start, second.batch.serial_end), (4, 5));
    let serials: Vec<i64> = second.codes.iter().map(|c| c.serial).collect();
    assert_eq!(serials, vec![4, 5]);
}

#[test]
fn test_serials_are_per_product() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let apple = create_test_product(&conn, company.id, "Apple Gummies", Some("APG"));
    let berry = create_test_product(&conn, company.id, "Berry Gummies", Some("BRG"));

    queries::generate_batch(&mut conn, apple.id, 5).unwrap();
    let berry_batch = queries::generate_batch(&mut conn, berry.id, 2).unwrap();

    assert_eq!(berry_batch.batch.sequence_no, 1);
    assert_eq!(berry_batch.batch.serial_start, 1);
    assert!(berry_batch.codes.iter().all(|c| c.value.starts_with("BRG-")));
}

#[test]
fn test_quantity_out_of_range_persists_nothing() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", None);

    for quantity in [0, -5, MAX_BATCH_QUANTITY + 1] {
        let result = queries::generate_batch(&mut conn, product.id, quantity);
        assert!(
            matches!(result, Err(AppError::InvalidQuantity(q)) if q == quantity),
            "quantity {quantity}: {result:?}"
        );
    }
    assert_eq!(count_rows(&conn, "batches"), 0);
    assert_eq!(count_rows(&conn, "codes"), 0);
}

#[test]
fn test_maximum_quantity_is_accepted() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", None);

    let generated = queries::generate_batch(&mut conn, product.id, MAX_BATCH_QUANTITY).unwrap();
    assert_eq!(generated.codes.len() as i64, MAX_BATCH_QUANTITY);
    assert_eq!(generated.batch.serial_end, MAX_BATCH_QUANTITY);
    assert_eq!(count_rows(&conn, "codes"), MAX_BATCH_QUANTITY);
}

#[test]
fn test_unknown_product_persists_nothing() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    create_test_company(&conn, "Acme");

    let result = queries::generate_batch(&mut conn, 999, 10);
    assert!(matches!(result, Err(AppError::ProductNotFound)), "{result:?}");
    assert_eq!(count_rows(&conn, "batches"), 0);
    assert_eq!(count_rows(&conn, "codes"), 0);
}

#[test]
fn test_default_prefix_when_product_has_none() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Plain", None);

    let generated =
        queries::generate_batch_with(&mut conn, product.id, 1, scripted_suffixes(&["K7QX"]))
            .unwrap();
    assert_eq!(generated.codes[0].value, "QR-0001-K7QX");
}

#[test]
fn test_generated_values_are_normalized() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", Some("apg"));

    let generated =
        queries::generate_batch_with(&mut conn, product.id, 1, scripted_suffixes(&["k7qx"]))
            .unwrap();
    assert_eq!(generated.codes[0].value, "APG-0001-K7QX");
    assert!(queries::get_code_by_value(&conn, "APG-0001-K7QX").unwrap().is_some());
}

#[test]
fn test_collision_retries_with_new_suffix() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    // Same default prefix, so serial 1 of both products can collide
    let first = create_test_product(&conn, company.id, "First", None);
    let second = create_test_product(&conn, company.id, "Second", None);

    queries::generate_batch_with(&mut conn, first.id, 1, scripted_suffixes(&["AAAA"])).unwrap();

    let generated = queries::generate_batch_with(
        &mut conn,
        second.id,
        1,
        scripted_suffixes(&["AAAA", "AAAA", "BBBB"]),
    )
    .unwrap();
    assert_eq!(generated.codes[0].value, "QR-0001-BBBB");
    assert_eq!(count_rows(&conn, "codes"), 2);
}

#[test]
fn test_exhausted_suffixes_roll_back_batch() {
    let db = test_db();
    let mut conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let first = create_test_product(&conn, company.id, "First", None);
    let second = create_test_product(&conn, company.id, "Second", None);

    queries::generate_batch_with(&mut conn, first.id, 1, scripted_suffixes(&["AAAA"])).unwrap();

    // Serial 1 is minted fine, serial 2 collides forever
    queries::generate_batch_with(&mut conn, first.id, 1, scripted_suffixes(&["CCCC"])).unwrap();
    let result = queries::generate_batch_with(
        &mut conn,
        second.id,
        2,
        scripted_suffixes(&["DDDD", "CCCC"]),
    );
    assert!(matches!(result, Err(AppError::GenerationExhausted)), "{result:?}");
    assert!(result.unwrap_err().is_retryable());

    // Neither the batch row nor the code minted before the failure survive
    assert!(queries::list_batches_for_product(&conn, second.id).unwrap().is_empty());
    assert!(queries::get_code_by_value(&conn, "QR-0001-DDDD").unwrap().is_none());
    assert_eq!(count_rows(&conn, "codes"), 2);

    // A later attempt with fresh suffixes gets sequence 1 again
    let retry = queries::generate_batch(&mut conn, second.id, 2).unwrap();
    assert_eq!(retry.batch.sequence_no, 1);
    assert_eq!(retry.batch.serial_start, 1);
}

#[test]
fn test_concurrent_generation_allocates_disjoint_serials() {
    let db = test_db();
    let product_id = {
        let conn = db.pool.get().unwrap();
        let company = create_test_company(&conn, "Acme");
        create_test_product(&conn, company.id, "Apple Gummies", Some("APG")).id
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = db.pool.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                queries::generate_batch(&mut conn, product_id, 25).unwrap()
            })
        })
        .collect();

    let batches: Vec<BatchWithCodes> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut sequences: Vec<i64> = batches.iter().map(|b| b.batch.sequence_no).collect();
    sequences.sort();
    assert_eq!(sequences, vec![1, 2, 3, 4]);

    let mut serials: Vec<i64> = batches
        .iter()
        .flat_map(|b| b.codes.iter().map(|c| c.serial))
        .collect();
    serials.sort();
    assert_eq!(serials, (1..=100).collect::<Vec<_>>());

    // Each batch owns a contiguous range matching its codes
    for generated in &batches {
        let own: Vec<i64> = generated.codes.iter().map(|c| c.serial).collect();
        let expected: Vec<i64> =
            (generated.batch.serial_start..=generated.batch.serial_end).collect();
        assert_eq!(own, expected);
    }
}
