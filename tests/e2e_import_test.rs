// ==========================================
// 端到端导入测试
// ==========================================
// 测试目标: 工作簿 → 抽取 → 对账 全流程,以及导入请求直连对账
// ==========================================


use deposit_import::domain::{DiagnosticLevel, EntityKind, ImportRequest, ProductKind, PostStatus};
use deposit_import::engine::ReconciliationEngine;
use deposit_import::importer::{DepositExtractor, ImportError, SheetSelection, WorkbookImporter};
use deposit_import::logging;
use deposit_import::repository::CatalogStore;
use serde_json::json;
use std::sync::Arc;
use test_helpers::{create_test_store, inventory_workbook, picture_names, seed_attachments, MaterialRow};

fn inventory_rows() -> Vec<MaterialRow> {
    vec![
        MaterialRow::new("DEP-1", "A1", "Porte isoplane", 5.0).with_length("204 cm"),
        MaterialRow::new("DEP-1", "B1", "Radiateur fonte", 2.0),
        MaterialRow::new("DEP-1", "B1.001", "Radiateur 6 éléments", 1.0).without_picture(),
        MaterialRow::new("DEP-1", "B1.002", "Radiateur 8 éléments", 1.0).without_picture(),
        MaterialRow::new("DEP-1", "C1", "Lavabo", 3.0).excluded(),
    ]
}

#[tokio::test]
async fn test_workbook_to_catalog_full_success() {
    logging::init_test();

    let (_temp_file, store) = create_test_store().expect("创建测试库失败");
    let rows = inventory_rows();
    let names = picture_names("DEP-1", &rows);
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    seed_attachments(&store, &names);

    // 抽取
    let workbook = inventory_workbook("DEP-1", "DEP-1", &rows);
    let outcome = WorkbookImporter::default()
        .extract(&workbook, &SheetSelection::default())
        .expect("抽取失败");
    assert!(
        !outcome.diagnostics.has_blocking_error(),
        "抽取不应有 error 诊断: {:?}",
        outcome.diagnostics.entries()
    );
    assert_eq!(outcome.materials.len(), 2, "未勾选导出的 C1 不应出现");

    // 对账
    let engine = ReconciliationEngine::new(store.clone());
    let report = engine.import(&outcome.to_request(true)).await;

    assert_eq!(report.status.code(), 200, "诊断: {:?}", report.diagnostics.entries());
    assert_eq!(report.diagnostics.count(DiagnosticLevel::Error), 0);
    assert_eq!(store.count_entities(EntityKind::Deposit).unwrap(), 1);
    assert_eq!(store.count_entities(EntityKind::Product).unwrap(), 2);
    assert_eq!(store.count_entities(EntityKind::ProductVariation).unwrap(), 2);

    let simple = store.find_product_by_sku("DEP-1A1").await.unwrap().unwrap();
    assert_eq!(simple.kind, ProductKind::Simple);
    assert_eq!(simple.stock_quantity, Some(5));
    assert_eq!(simple.dimensions.length, "204");
    assert_eq!(simple.status, PostStatus::Publish);
    assert!(simple.image_id.is_some());

    let variable = store.find_product_by_sku("DEP-1B1").await.unwrap().unwrap();
    assert_eq!(variable.kind, ProductKind::Variable);
    let variations = store.list_variations(variable.id.unwrap()).unwrap();
    let skus: Vec<&str> = variations.iter().map(|v| v.sku.as_str()).collect();
    assert_eq!(skus, vec!["DEP-1B1.001", "DEP-1B1.002"]);

    assert!(store.find_product_by_sku("DEP-1C1").await.unwrap().is_none());

    // 库存点元数据
    let deposit = report.deposit_id.expect("库存点应已创建");
    assert_eq!(
        store.get_meta(deposit, "dismantle_date").await.unwrap().as_deref(),
        Some("2024-03-01")
    );
    assert_eq!(
        store.get_meta(simple.id.unwrap(), "availability_date").await.unwrap().as_deref(),
        Some("2024-03-01")
    );
}

#[tokio::test]
async fn test_request_simple_and_variable_items() {
    let (_temp_file, store) = create_test_store().unwrap();
    let body = json!({
        "siteData": {"deposit_name": "DEP-1", "building_name": "Halle Nord", "provider": "Bailleur"},
        "depositData": [
            {"ref": "A1", "designation": "Porte", "qty": 5, "deposit": "DEP-1"},
            {"ref": "B1", "designation": "Radiateur", "qty": 2, "deposit": "DEP-1",
             "variations": [
                {"ref": "B1.001", "designation": "Radiateur 6", "qty": 1, "deposit": "DEP-1"},
                {"ref": "B1.002", "designation": "Radiateur 8", "qty": 1, "deposit": "DEP-1"}
             ]}
        ],
        "update_qty": true
    });
    let request: ImportRequest = serde_json::from_value(body).unwrap();

    let engine = ReconciliationEngine::new(store.clone());
    let report = engine.import(&request).await;

    assert_eq!(report.status.code(), 200, "诊断: {:?}", report.diagnostics.entries());
    assert_eq!(store.count_entities(EntityKind::Deposit).unwrap(), 1);

    let simple = store.find_product_by_sku("A1").await.unwrap().unwrap();
    assert_eq!(simple.stock_quantity, Some(5));

    let variable = store.find_product_by_sku("B1").await.unwrap().unwrap();
    assert_eq!(store.list_variations(variable.id.unwrap()).unwrap().len(), 2);
    assert_eq!(
        store.get_meta(variable.id.unwrap(), "_initial_stock").await.unwrap().as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn test_reimport_updates_in_place() {
    let (_temp_file, store) = create_test_store().unwrap();
    let rows = inventory_rows();
    let names = picture_names("DEP-1", &rows);
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    seed_attachments(&store, &names);
    let engine = ReconciliationEngine::new(store.clone());

    let workbook = inventory_workbook("DEP-1", "DEP-1", &rows);
    let outcome = WorkbookImporter::default()
        .extract(&workbook, &SheetSelection::default())
        .unwrap();
    engine.import(&outcome.to_request(true)).await;

    // 第二次: 名称变化,库存不更新
    let mut changed = rows.clone();
    changed[0].designation = "Porte pleine".to_string();
    changed[0].quantity = 9.0;
    let workbook = inventory_workbook("DEP-1", "DEP-1", &changed);
    let outcome = WorkbookImporter::default()
        .extract(&workbook, &SheetSelection::default())
        .unwrap();
    let report = engine.import(&outcome.to_request(false)).await;

    assert_eq!(report.status.code(), 200);
    assert_eq!(store.count_entities(EntityKind::Deposit).unwrap(), 1);
    assert_eq!(store.count_entities(EntityKind::Product).unwrap(), 2);
    assert_eq!(store.count_entities(EntityKind::ProductVariation).unwrap(), 2);

    let simple = store.find_product_by_sku("DEP-1A1").await.unwrap().unwrap();
    assert_eq!(simple.name, "Porte pleine");
    assert_eq!(simple.stock_quantity, Some(5), "update_qty=false 时库存保持不变");
}

#[test]
fn test_reference_mismatch_never_reaches_extraction() {
    let rows = vec![MaterialRow::new("DEP-2", "A1", "Porte", 1.0)];
    let workbook = inventory_workbook("DEP-1", "DEP-2", &rows);

    let err = WorkbookImporter::default()
        .extract(&workbook, &SheetSelection::default())
        .unwrap_err();

    match err {
        ImportError::ReferenceMismatch { overview, materials, diagnostics } => {
            assert_eq!(overview, "DEP-1");
            assert_eq!(materials, "DEP-2");
            assert_eq!(diagnostics.len(), 1);
        }
        other => panic!("期望 ReferenceMismatch, 实际 {:?}", other),
    }
}

#[tokio::test]
async fn test_unresolved_picture_is_partial_but_published() {
    let (_temp_file, store) = create_test_store().unwrap();
    let rows = vec![MaterialRow::new("DEP-1", "A1", "Porte", 1.0)];
    // 只预置库存点图片,物料主图无附件
    seed_attachments(&store, &["DEP-1_thumb", "DEP-1_photo1"]);

    let workbook = inventory_workbook("DEP-1", "DEP-1", &rows);
    let outcome = WorkbookImporter::default()
        .extract(&workbook, &SheetSelection::default())
        .unwrap();
    let engine = ReconciliationEngine::new(store.clone());
    let report = engine.import(&outcome.to_request(true)).await;

    assert_eq!(report.status.code(), 206);
    assert_eq!(report.diagnostics.count(DiagnosticLevel::Error), 1);
    let product = store.find_product_by_sku("DEP-1A1").await.unwrap().unwrap();
    assert_eq!(product.status, PostStatus::Publish);
}

#[tokio::test]
async fn test_engine_accepts_shared_store_trait_object() {
    let (_temp_file, store) = create_test_store().unwrap();
    let shared: Arc<dyn CatalogStore> = store.clone();
    let engine = ReconciliationEngine::new(shared);

    let request: ImportRequest =
        serde_json::from_value(json!({"siteData": {"deposit_name": "DEP-9", "building_name": "Dépôt"}}))
            .unwrap();
    let report = engine.import(&request).await;

    assert!(report.deposit_id.is_some());
    assert!(report.product_ids.is_empty());
}
