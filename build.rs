fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &[
                "proto/sidekiq/auth/v1/auth.proto",
                "proto/sidekiq/people/v1/people.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
