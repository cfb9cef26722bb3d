use clap::Parser;
use convert_image::config::Config;
use convert_image::server::ConvertServer;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;

/// convert-image - converts uploaded images to WebP, AVIF, JPEG, PNG or ICO
#[derive(Parser, Debug)]
#[command(name = "convert-image")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the config file and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the client page
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    // Initialize logging subsystem
    if let Err(e) = convert_image::logging::init_subscriber() {
        eprintln!("Failed to initialize logging subsystem: {}", e);
        std::process::exit(1);
    }

    // Parse command-line arguments
    let args = Args::parse();

    // Defaults, then the config file, then PORT
    let mut config = Config::load(args.config.as_deref()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        std::process::exit(1);
    });

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(static_dir) = args.static_dir {
        config.static_dir = static_dir;
    }
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    tracing::info!(
        config_file = ?args.config,
        server_address = %config.server.address,
        server_port = config.server.port,
        threads = config.server.threads,
        static_dir = %config.static_dir.display(),
        max_file_size = config.converter.max_file_size,
        "Configuration loaded successfully"
    );

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    // Create Pingora server
    let mut server = Server::new(Some(opt)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create Pingora server");
        std::process::exit(1);
    });
    server.bootstrap();

    let listen_addr = config.server.listen_addr();
    let threads = config.server.threads;

    let app = ConvertServer::new(config);

    let mut service = pingora_proxy::http_proxy_service(&server.configuration, app);
    service.threads = Some(threads);
    service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Convert-image écoute sur http://{}", listen_addr);

    // Register service with server
    server.add_service(service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
