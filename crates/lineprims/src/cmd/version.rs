use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("lineprims {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("target: {}", option_env!("LINEPRIMS_BUILD_TARGET").unwrap_or("unknown"));
    println!("profile: {}", option_env!("LINEPRIMS_BUILD_PROFILE").unwrap_or("unknown"));
    println!("os: {}", std::env::consts::OS);
    println!("arch: {}", std::env::consts::ARCH);
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );
    println!("reader_thread: {}", lineprims::stream::DEFAULT_THREAD_NAME);

    Ok(SUCCESS)
}
