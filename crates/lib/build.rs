const PROTOS: [&str; 3] = [
  "proto/vorpal/agent.proto",
  "proto/vorpal/archive.proto",
  "proto/vorpal/artifact.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
  if std::env::var_os("PROTOC").is_none() {
    let protoc = protoc_bin_vendored::protoc_bin_path()?;
    // SAFETY: build scripts run single-threaded.
    unsafe { std::env::set_var("PROTOC", protoc) };
  }

  tonic_build::configure().compile_protos(&PROTOS, &["proto"])?;

  Ok(())
}
