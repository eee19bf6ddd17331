use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use twincam::permissions::check_permission_detailed;
use twincam::{
    CameraError, CaptureDelegate, CaptureRequest, CaptureSessionController,
    CapturedImage, FlashMode, MainQueue, NokhwaBackend, Submission, SystemAuthorization,
    TwinCamConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    twincam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: twincam-cli <status|devices|capture|preview> [args]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "status" => cmd_status(&args),
        "devices" => cmd_devices(&args),
        "capture" => cmd_capture(&args),
        "preview" => cmd_preview(&args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> Result<TwinCamConfig, CameraError> {
    let path = flag_value(args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(TwinCamConfig::default_path);
    let mut config = TwinCamConfig::load_layered(path)?;
    if let Some(camera) = flag_value(args, "--camera") {
        config.session.default_camera = camera.parse().map_err(CameraError::ConfigurationError)?;
    }
    Ok(config)
}

fn build_controller(config: TwinCamConfig) -> (CaptureSessionController, MainQueue) {
    let (dispatcher, queue) = MainQueue::new();
    let backend = NokhwaBackend::new(config.devices.clone(), config.capture.jpeg_quality);
    let controller = CaptureSessionController::create(
        Arc::new(backend),
        Arc::new(SystemAuthorization),
        Arc::new(dispatcher),
        config,
    );
    (controller, queue)
}

fn cmd_status(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let permission = check_permission_detailed();
    let info = twincam::get_info();
    if args.contains(&"--json".to_string()) {
        let status = serde_json::json!({
            "crate": info,
            "permission": permission,
        });
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!("{} {} ({})", info.name, info.version, info.os);
        println!("Camera permission: {} - {}", permission.status, permission.message);
    }
    Ok(())
}

fn cmd_devices(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = NokhwaBackend::list_cameras()?;
    if args.contains(&"--json".to_string()) {
        let devices: Vec<_> = cameras
            .iter()
            .map(|(index, name)| serde_json::json!({ "index": index, "name": name }))
            .collect();
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for (index, name) in cameras {
            println!("{}: {}", index, name);
        }
    }
    Ok(())
}

/// Holds the single outcome of a CLI capture
#[derive(Default)]
struct CliDelegate {
    outcome: Mutex<Option<Result<CapturedImage, CameraError>>>,
}

impl CliDelegate {
    fn is_waiting(&self) -> bool {
        self.outcome.lock().map(|o| o.is_none()).unwrap_or(false)
    }

    fn take(&self) -> Option<Result<CapturedImage, CameraError>> {
        self.outcome.lock().ok().and_then(|mut o| o.take())
    }
}

impl CaptureDelegate for CliDelegate {
    fn did_capture_image(&self, image: CapturedImage) {
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = Some(Ok(image));
        }
    }

    fn did_fail_to_capture_image(&self, error: CameraError) {
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = Some(Err(error));
        }
    }
}

fn cmd_capture(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    // capture [--camera <front|back>] [--flash <auto|on|off>] [--no-stabilization]
    //         [--out <path>] [--timeout <ms>] [--json]
    let config = load_config(args)?;
    let flash: FlashMode = match flag_value(args, "--flash") {
        Some(value) => value.parse().map_err(CameraError::ConfigurationError)?,
        None => config.capture.default_flash,
    };
    let stabilization = !args.contains(&"--no-stabilization".to_string());
    let out = PathBuf::from(flag_value(args, "--out").unwrap_or("capture.jpg"));
    let timeout_ms: u64 = flag_value(args, "--timeout").unwrap_or("5000").parse()?;
    let json = args.contains(&"--json".to_string());

    let (controller, queue) = build_controller(config);
    controller.start_preview(true);
    queue.run_while(Duration::from_millis(timeout_ms), || !controller.is_running());
    if !controller.is_running() {
        return Err("capture session did not start".into());
    }

    let delegate = Arc::new(CliDelegate::default());
    controller.set_delegate(&delegate);

    let request = CaptureRequest::new()
        .with_flash(flash)
        .with_stabilization(stabilization);
    if controller.capture_photo(request)? == Submission::Skipped {
        return Err("no capture session configured".into());
    }

    if !queue.run_while(Duration::from_millis(timeout_ms), || delegate.is_waiting()) {
        return Err("timed out waiting for capture".into());
    }

    let image = delegate.take().ok_or("capture produced no result")??;
    image.to_upright().save(&out)?;
    controller.stop_preview();

    if json {
        let summary = serde_json::json!({
            "id": image.id,
            "camera": image.camera,
            "width": image.width(),
            "height": image.height(),
            "orientation": image.orientation.exif_tag(),
            "captured_at": image.captured_at,
            "path": out,
        });
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "Captured {}x{} from {} camera -> {}",
            image.width(),
            image.height(),
            image.camera,
            out.display()
        );
    }
    Ok(())
}

fn cmd_preview(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    // preview [--camera <front|back>] [--switch-every <secs>]
    let config = load_config(args)?;
    let switch_every = flag_value(args, "--switch-every")
        .map(str::parse::<u64>)
        .transpose()?
        .map(Duration::from_secs);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let (controller, queue) = build_controller(config);
    controller.start_preview(true);

    println!("Previewing, press Ctrl-C to stop");
    let mut since_switch = Duration::ZERO;
    let tick = Duration::from_millis(100);
    while running.load(Ordering::SeqCst) {
        queue.run_until(tick);
        since_switch += tick;
        if let Some(interval) = switch_every {
            if since_switch >= interval && controller.is_running() {
                let next = controller.camera_type().other();
                controller.set_camera_type(next);
                println!("Switched to {} camera", next);
                since_switch = Duration::ZERO;
            }
        }
    }

    controller.stop_preview();
    println!("Preview stopped");
    Ok(())
}
