//! Interactive walkthrough driven by the screen flow

use std::io::Write;
use std::time::Duration;

use firminia_ble_controller::{
    AnyTransport, ConfigurationPayload, ConnectionState, Locale, Screen, ScreenFlow,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

const SPLASH_DELAY: Duration = Duration::from_millis(1500);

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// `None` on end of input.
    async fn ask(&mut self, question: &str) -> std::io::Result<Option<String>> {
        print!("{question}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Keeps `current` on an empty answer.
    async fn field(&mut self, label: &str, current: &str) -> std::io::Result<Option<String>> {
        let question = if current.is_empty() {
            format!("  {label}: ")
        } else {
            format!("  {label} [{current}]: ")
        };
        Ok(self.ask(&question).await?.map(|answer| {
            if answer.is_empty() {
                current.to_string()
            } else {
                answer
            }
        }))
    }
}

pub async fn run(mut flow: ScreenFlow<AnyTransport>) -> Result<(), Box<dyn std::error::Error>> {
    let mut prompt = Prompt::new();
    let mut last = None;

    loop {
        let screen = flow.current();
        if last != Some(screen) {
            debug!(?screen, "screen changed");
            last = Some(screen);
        }

        let keep_going = match screen {
            Screen::Splash => {
                println!("FirminIA V3");
                tokio::time::sleep(SPLASH_DELAY).await;
                flow.complete_splash();
                true
            }
            Screen::Introduction => introduction(&mut flow, &mut prompt).await?,
            Screen::Checking => {
                println!("Checking Bluetooth...");
                report(flow.check_transport().await);
                true
            }
            Screen::TransportOff => transport_off(&mut flow, &mut prompt).await?,
            Screen::Pairing => pairing(&mut flow, &mut prompt).await?,
            Screen::MainApp => main_app(&mut flow, &mut prompt).await?,
            Screen::Configuration => configuration(&mut flow, &mut prompt).await?,
        };

        if !keep_going {
            break;
        }
    }

    flow.disconnect().await;
    println!("Bye.");
    Ok(())
}

fn report<R>(result: firminia_ble_controller::Result<R>) {
    if let Err(e) = result {
        println!("! {e}");
    }
}

async fn introduction(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<bool> {
    println!();
    println!("This tool sends Wi-Fi and server settings to a FirminIA V3 device.");
    println!("Power the device on and keep it close to this computer.");
    println!("Language: {}", flow.session().locale().display_name());

    let Some(answer) = prompt.ask("Press Enter to continue, [l]anguage, [q]uit: ").await? else {
        return Ok(false);
    };
    match answer.as_str() {
        "q" => return Ok(false),
        "l" => choose_language(flow, prompt).await?,
        _ => {
            flow.acknowledge_introduction();
        }
    }
    Ok(true)
}

async fn choose_language(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<()> {
    for locale in Locale::ALL {
        println!("  {} {}", locale.code(), locale.display_name());
    }
    let Some(answer) = prompt.ask("Language: ").await? else {
        return Ok(());
    };
    match answer.parse::<Locale>() {
        Ok(locale) => {
            if let Err(e) = flow.session_mut().set_locale(locale) {
                println!("! {e}");
            }
        }
        Err(e) => println!("! {e}"),
    }
    Ok(())
}

async fn transport_off(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<bool> {
    println!();
    println!("Bluetooth is not available.");
    let Some(answer) = prompt.ask("[s]ettings, [r]echeck, [q]uit: ").await? else {
        return Ok(false);
    };
    match answer.as_str() {
        "q" => return Ok(false),
        "s" => println!("{}", flow.open_settings()),
        _ => report(flow.check_transport().await),
    }
    Ok(true)
}

async fn pairing(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<bool> {
    println!();
    if flow.devices().is_empty() {
        println!("No devices yet.");
    } else {
        println!("Devices:");
        for (i, device) in flow.devices().iter().enumerate() {
            println!("  {}) {} ({})", i + 1, device.name, device.id);
        }
    }

    let Some(answer) = prompt.ask("[s]earch, device number, [q]uit: ").await? else {
        return Ok(false);
    };
    if answer == "q" {
        return Ok(false);
    }

    if let Ok(n) = answer.parse::<usize>() {
        let Some(device) = n.checked_sub(1).and_then(|i| flow.devices().get(i)).cloned() else {
            println!("! no device {n}");
            return Ok(true);
        };
        println!("Connecting to {}...", device.name);
        report(flow.connect(&device.id).await);
        return Ok(true);
    }

    println!("Searching...");
    match flow.scan().await {
        Ok(devices) => println!("Found {} device(s).", devices.len()),
        Err(e) => println!("! {e}"),
    }
    Ok(true)
}

async fn main_app(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<bool> {
    let name = flow
        .connected_device()
        .map(|d| d.name)
        .unwrap_or_default();
    println!();
    println!("Connected to {name}.");

    let Some(answer) = prompt.ask("[c]onfigure, [d]isconnect, [q]uit: ").await? else {
        return Ok(false);
    };
    match answer.as_str() {
        "q" => return Ok(false),
        "c" => report(flow.open_configuration()),
        "d" => {
            flow.disconnect().await;
        }
        _ => {}
    }
    Ok(true)
}

async fn configuration(
    flow: &mut ScreenFlow<AnyTransport>,
    prompt: &mut Prompt,
) -> std::io::Result<bool> {
    println!();
    println!("Device configuration (Enter keeps the value in brackets)");

    let Some(payload) = fill_form(prompt, flow.configuration_draft()).await? else {
        return Ok(false);
    };

    // the link may have dropped while the form was being filled in
    if flow.manager().state() != ConnectionState::Connected {
        println!("! device disconnected");
        return Ok(true);
    }

    let Some(answer) = prompt.ask("[s]end, [d]iscard: ").await? else {
        return Ok(false);
    };
    if answer != "s" {
        flow.close_configuration();
        return Ok(true);
    }

    match flow.submit_configuration(&payload).await {
        Ok(()) => println!("Configuration sent."),
        Err(e) => println!("! {e}"),
    }
    Ok(true)
}

async fn fill_form(
    prompt: &mut Prompt,
    mut payload: ConfigurationPayload,
) -> std::io::Result<Option<ConfigurationPayload>> {
    macro_rules! field {
        ($label:expr, $slot:expr) => {
            match prompt.field($label, &$slot).await? {
                Some(value) => $slot = value,
                None => return Ok(None),
            }
        };
    }

    field!("Wi-Fi SSID", payload.ssid);
    field!("Wi-Fi password", payload.password);
    field!("Server", payload.server);
    field!("Port", payload.port);
    field!("Token", payload.token);
    field!("User", payload.user);
    field!("Interval (minutes)", payload.interval);

    let Some(language) = prompt.field("Language", payload.language.code()).await? else {
        return Ok(None);
    };
    match language.parse() {
        Ok(locale) => payload.language = locale,
        Err(e) => println!("! {e}, keeping {}", payload.language.code()),
    }
    Ok(Some(payload))
}
