// Build script for citadel-core
// Compiles Protocol Buffer definitions for the agent orchestrator stream client.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so the build does not depend on a system install.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/agent_stream.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/agent_stream.proto");

    Ok(())
}
