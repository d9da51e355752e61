use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;

#[test]
fn test_create_and_get_company() {
    let db = test_db();
    let conn = db.pool.get().unwrap();

    let company = create_test_company(&conn, "  Acme Gummies ");
    assert_eq!(company.name, "Acme Gummies");

    let fetched = queries::get_company_by_id(&conn, company.id)
        .unwrap()
        .expect("company exists");
    assert_eq!(fetched.name, "Acme Gummies");
    assert!(queries::get_company_by_id(&conn, company.id + 100).unwrap().is_none());
}

#[test]
fn test_company_name_required() {
    let db = test_db();
    let conn = db.pool.get().unwrap();

    let result = queries::create_company(
        &conn,
        &CreateCompany {
            name: "   ".into(),
            description: None,
            website: None,
            logo_url: None,
        },
    );
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(count_rows(&conn, "companies"), 0);
}

#[test]
fn test_list_companies_sorted_by_name() {
    let db = test_db();
    let conn = db.pool.get().unwrap();

    create_test_company(&conn, "Zeta Snacks");
    create_test_company(&conn, "Acme Gummies");

    let names: Vec<String> = queries::list_companies(&conn)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Acme Gummies", "Zeta Snacks"]);
}

#[test]
fn test_create_product_round_trips_marketplace_urls() {
    let db = test_db();
    let conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");

    let product = create_test_product(&conn, company.id, "Apple Gummies", Some("APG"));
    let fetched = queries::get_product_by_id(&conn, product.id).unwrap().unwrap();

    assert_eq!(fetched, product);
    assert_eq!(
        fetched.marketplace_urls.get("amazon").map(String::as_str),
        Some("https://amazon.example/Apple-Gummies")
    );
    assert!(fetched.is_active);
}

#[test]
fn test_create_product_for_missing_company() {
    let db = test_db();
    let conn = db.pool.get().unwrap();

    let result = queries::create_product(
        &conn,
        &CreateProduct {
            company_id: 42,
            name: "Orphan".into(),
            description: None,
            image_url: None,
            category: None,
            cashback_amount: 100.0,
            sku_prefix: None,
            marketplace_urls: BTreeMap::new(),
            is_active: true,
        },
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(count_rows(&conn, "products"), 0);
}

#[test]
fn test_list_products_filters_by_company() {
    let db = test_db();
    let conn = db.pool.get().unwrap();
    let acme = create_test_company(&conn, "Acme");
    let zeta = create_test_company(&conn, "Zeta");

    create_test_product(&conn, acme.id, "Apple Gummies", None);
    create_test_product(&conn, acme.id, "Berry Gummies", None);
    create_test_product(&conn, zeta.id, "Zesty Chips", None);

    assert_eq!(queries::list_products(&conn, None).unwrap().len(), 3);

    let acme_products = queries::list_products(&conn, Some(acme.id)).unwrap();
    assert_eq!(acme_products.len(), 2);
    assert!(acme_products.iter().all(|p| p.company_id == acme.id));
}

#[test]
fn test_update_product_patch_semantics() {
    let db = test_db();
    let conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", Some("APG"));

    // Only the provided fields change; Some(None) clears a nullable column
    let update = UpdateProduct {
        name: Some("Green Apple Gummies".into()),
        category: Some(None),
        cashback_amount: Some(150.0),
        ..Default::default()
    };
    assert!(queries::update_product(&conn, product.id, &update).unwrap());

    let updated = queries::get_product_by_id(&conn, product.id).unwrap().unwrap();
    assert_eq!(updated.name, "Green Apple Gummies");
    assert_eq!(updated.category, None);
    assert_eq!(updated.cashback_amount, 150.0);
    assert_eq!(updated.sku_prefix.as_deref(), Some("APG"));
    assert_eq!(updated.marketplace_urls, product.marketplace_urls);
}

#[test]
fn test_update_product_nothing_to_change() {
    let db = test_db();
    let conn = db.pool.get().unwrap();
    let company = create_test_company(&conn, "Acme");
    let product = create_test_product(&conn, company.id, "Apple Gummies", None);

    assert!(!queries::update_product(&conn, product.id, &UpdateProduct::default()).unwrap());
    assert!(
        !queries::update_product(
            &conn,
            product.id + 1,
            &UpdateProduct {
                is_active: Some(false),
                ..Default::default()
            }
        )
        .unwrap()
    );
}

#[test]
fn test_duplicate_company_name_rejected() {
    let db = test_db();
    let conn = db.pool.get().unwrap();
    create_test_company(&conn, "Acme");

    let result = queries::create_company(
        &conn,
        &CreateCompany {
            name: "Acme ".into(),
            description: None,
            website: None,
            logo_url: None,
        },
    );
    assert!(matches!(result, Err(AppError::BadRequest(_))), "{result:?}");
    assert_eq!(count_rows(&conn, "companies"), 1);
}

#[test]
fn test_concurrent_duplicate_company_names() {
    const CREATORS: usize = 8;

    let db = test_db();
    let barrier = Arc::new(Barrier::new(CREATORS));
    let handles: Vec<_> = (0..CREATORS)
        .map(|_| {
            let pool = db.pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = pool.get().unwrap();
                barrier.wait();
                queries::create_company(
                    &conn,
                    &CreateCompany {
                        name: "Acme".into(),
                        description: None,
                        website: None,
                        logo_url: None,
                    },
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(AppError::BadRequest(msg)) if msg == "Company name already exists"),
            "{result:?}"
        );
    }
    let conn = db.pool.get().unwrap();
    assert_eq!(count_rows(&conn, "companies"), 1);
}
