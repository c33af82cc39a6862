fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tfplugin_proto = "../../proto/tfplugin6.proto";
    let proto_dir = "../../proto";

    std::fs::create_dir_all("src/generated")?;

    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed={}", tfplugin_proto);

    // Terraform plugin protocol (server only)
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .out_dir("src/generated")
        .compile(&[tfplugin_proto], &[proto_dir])?;

    Ok(())
}
