use std::process;

use clap::Args;

use cudagen::codegen::cuda::spell;
use cudagen::ir::DataType;

use super::resolve_target;

#[derive(Args)]
pub struct SpellArgs {
    /// Data types such as float16x4, int8x4, uint1
    #[arg(required = true)]
    pub dtypes: Vec<String>,
    /// Target: cuda, sm_XX, or a targets/<name>.toml config
    #[arg(long, default_value = "cuda")]
    pub target: String,
}

pub fn cmd_spell(args: SpellArgs) {
    let SpellArgs { dtypes, target } = args;
    let target = resolve_target(&target);

    let mut failed = false;
    for name in &dtypes {
        let dtype: DataType = match name.parse() {
            Ok(t) => t,
            Err(msg) => {
                eprintln!("error: {}", msg);
                failed = true;
                continue;
            }
        };
        match spell(dtype, &target) {
            Ok(s) => {
                let needs = s.needs.names();
                if needs.is_empty() {
                    println!("{:<14} {}", name, s.text);
                } else {
                    println!("{:<14} {:<10} (needs {})", name, s.text, needs.join(", "));
                }
            }
            Err(e) => {
                eprintln!("error: {}", e.message);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
