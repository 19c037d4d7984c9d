//! ResourcePath 集成测试

use pd_common::ResourcePath;
use pd_errors::AppError;

#[test]
fn test_etc_passwd_traversal_is_rejected() {
    let result = ResourcePath::parse("../etc/passwd");
    assert!(matches!(result, Err(AppError::InvalidPath(_))));
}

#[test]
fn test_url_style_path_is_relative() {
    let path: ResourcePath = "/invoices/2024/march.pdf".parse().unwrap();
    assert_eq!(path.to_string(), "invoices/2024/march.pdf");
}

#[test]
fn test_deserialize_validates() {
    let ok: ResourcePath = serde_json::from_str("\"docs/readme.txt\"").unwrap();
    assert_eq!(ok.as_str(), "docs/readme.txt");

    let err = serde_json::from_str::<ResourcePath>("\"docs/../../secret\"");
    assert!(err.is_err());
}

#[test]
fn test_encoded_dots_are_literal_names() {
    // 百分号编码由 HTTP 层解码，这里按字面文件名处理
    let path = ResourcePath::parse("%2e%2e/file").unwrap();
    assert_eq!(path.as_str(), "%2e%2e/file");
}
