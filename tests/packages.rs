use std::sync::Arc;

use blockbot::exec::ExecutionResult;
use blockbot::fs::mock::MockFileSystem;
use blockbot::service::{PackageInstallRequest, PackageInstaller};
use blockbot_test_utils::{ConfigBuilder, FakeBackend};

fn installer(fs: MockFileSystem, backend: &FakeBackend) -> PackageInstaller {
    let cfg = ConfigBuilder::new()
        .python("python3")
        .requirements_file("/app/requirements.txt")
        .build();
    PackageInstaller::new(&cfg.execution, &cfg.packages, Arc::new(fs), backend.arc())
}

fn request(packages: &[&str]) -> PackageInstallRequest {
    PackageInstallRequest {
        packages: packages.iter().map(|p| p.to_string()).collect(),
        use_requirements: false,
    }
}

#[tokio::test]
async fn empty_package_list_never_spawns() {
    let backend = FakeBackend::new();
    let pip = installer(MockFileSystem::new(), &backend);

    let result = pip.install(request(&["", "  "])).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("No packages specified"));
    assert!(result.installed_packages.is_empty());
    assert_eq!(backend.spawn_count(), 0);
}

#[tokio::test]
async fn malformed_specifier_is_rejected() {
    let backend = FakeBackend::new();
    let pip = installer(MockFileSystem::new(), &backend);

    let result = pip.install(request(&["numpy", "--index-url=http://evil"])).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Invalid package specifier: --index-url=http://evil")
    );
    assert_eq!(backend.spawn_count(), 0);
}

#[tokio::test]
async fn install_reports_names_from_pip_output() {
    let backend = FakeBackend::new().respond_with(ExecutionResult::finished(
        vec![
            "Collecting requests==2.31.0".to_string(),
            "Successfully installed idna-3.6 requests-2.31.0".to_string(),
        ],
        None,
        Some(0),
    ));
    let pip = installer(MockFileSystem::new(), &backend);

    let result = pip.install(request(&["requests==2.31.0"])).await;

    assert!(result.success);
    assert_eq!(result.installed_packages, vec!["idna", "requests"]);

    let spec = &backend.specs()[0];
    assert_eq!(spec.program, "python3");
    assert_eq!(spec.args, vec!["-m", "pip", "install", "requests==2.31.0"]);
}

#[tokio::test]
async fn failed_install_lists_nothing() {
    let backend = FakeBackend::new().respond_with(ExecutionResult::finished(
        Vec::new(),
        Some("ERROR: No matching distribution found for nopenope".to_string()),
        Some(1),
    ));
    let pip = installer(MockFileSystem::new(), &backend);

    let result = pip.install(request(&["nopenope"])).await;

    assert!(!result.success);
    assert!(result.installed_packages.is_empty());
    assert!(result.error.unwrap_or_default().contains("No matching distribution"));
}

#[tokio::test]
async fn requirements_file_must_exist() {
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    let pip = installer(fs.clone(), &backend);
    let from_file = PackageInstallRequest {
        packages: Vec::new(),
        use_requirements: true,
    };

    let missing = pip.install(from_file.clone()).await;
    assert_eq!(
        missing.error.as_deref(),
        Some("Requirements file not found: /app/requirements.txt")
    );
    assert_eq!(backend.spawn_count(), 0);

    fs.add_file("/app/requirements.txt");
    let found = pip.install(from_file).await;
    assert!(found.success);
    assert_eq!(
        backend.specs()[0].args,
        vec!["-m", "pip", "install", "-r", "/app/requirements.txt"]
    );
}

#[tokio::test]
async fn list_never_reports_installed_packages() {
    let backend = FakeBackend::new().respond_with(ExecutionResult::finished(
        vec!["Package Version".to_string(), "pip 24.0".to_string()],
        None,
        Some(0),
    ));
    let pip = installer(MockFileSystem::new(), &backend);

    let result = pip.list().await;

    assert!(result.success);
    assert_eq!(result.output.len(), 2);
    assert!(result.installed_packages.is_empty());
    assert_eq!(backend.specs()[0].args, vec!["-m", "pip", "list"]);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["installedPackages"], serde_json::json!([]));
}
