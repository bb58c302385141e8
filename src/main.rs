//! # 图片工具箱 · 命令行入口
//!
//! 本文件仅负责日志初始化、设置加载与子命令分发。
//! 业务逻辑分布在 `tools` 子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use image_toolbox::error::AppError;
use image_toolbox::settings::{Presentation, ToolSettings};
use image_toolbox::tools::{
    self, CommandError, OutputFormat, QR_DEFAULT_SIZE, QrRequest, ResizePreset,
    ToolKind, ToolRequest, ToolService,
};

#[derive(Debug, Parser)]
#[command(name = "image-toolbox", version, about = "Free online image tools, from the terminal")]
struct Cli {
    /// JSON 设置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖图片处理服务地址
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    json: bool,

    /// 提示样式：plain / decorated
    #[arg(long, global = true)]
    style: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// 结果输出目录
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 调整尺寸（只填一边时按原图比例推算另一边）
    Resize {
        file: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// 社交平台预设，如 "Instagram Story"
        #[arg(long, conflicts_with_all = ["width", "height"])]
        preset: Option<String>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        quality: Option<u8>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 格式转换
    Convert {
        file: PathBuf,
        #[arg(long)]
        format: String,
        #[arg(long)]
        quality: Option<u8>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 压缩（多个文件时批量并发处理）
    Compress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long, conflicts_with = "preset")]
        quality: Option<u8>,
        /// high-quality / balanced / maximum / extreme
        #[arg(long)]
        preset: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 移除背景（需要 REMOVE_BG_API_KEY）
    RemoveBg {
        file: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 多张图片合成 PDF（按参数顺序）
    Pdf {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 生成二维码
    Qr {
        text: String,
        #[arg(long, default_value_t = QR_DEFAULT_SIZE)]
        size: u32,
        #[arg(long, default_value = "#000000")]
        fg: String,
        #[arg(long, default_value = "#ffffff")]
        bg: String,
        /// 同时复制到剪贴板
        #[arg(long)]
        copy: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 本地估算输出体积（不发请求）
    Estimate {
        file: PathBuf,
        #[arg(long, value_parser = parse_tool)]
        tool: ToolKind,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        quality: Option<u8>,
    },
    /// 列出压缩档位与尺寸预设
    Presets,
    /// 打印当前生效的设置（API Key 脱敏）
    Settings,
}

fn parse_tool(value: &str) -> Result<ToolKind, String> {
    match value {
        "resize" => Ok(ToolKind::Resize),
        "convert" => Ok(ToolKind::Convert),
        "compress" => Ok(ToolKind::Compress),
        other => Err(format!("estimate 仅支持 resize / convert / compress，收到 {}", other)),
    }
}

fn parse_format(value: Option<&str>) -> Result<Option<OutputFormat>, CommandError> {
    value
        .map(OutputFormat::from_str)
        .transpose()
        .map_err(CommandError::from)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Runtime(format!("序列化输出失败: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            log::warn!("⚠️ 读取 .env 失败: {}", err);
        }
    }

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{}", AppError::Runtime(format!("无法创建 tokio 运行时: {}", err)));
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let mut settings = match ToolSettings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(base) = &cli.api_base {
        settings.api_base_url = base.clone();
    }
    if let Some(style) = cli.style.as_deref() {
        match Presentation::parse(style) {
            Some(p) => settings.presentation = p,
            None => log::warn!("⚠️ 未知提示样式 {}，保持 {:?}", style, settings.presentation),
        }
    }

    match dispatch(cli.command, &settings, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.json {
                if let Err(print_err) = print_json(&err) {
                    eprintln!("{}", print_err);
                }
            } else {
                eprintln!("{}", settings.presentation.decorate_error(&err.to_string()));
            }
            ExitCode::FAILURE
        }
    }
}

fn emit_value<T: Serialize>(value: &T) -> Result<(), CommandError> {
    print_json(value).map_err(|e| CommandError {
        code: "E_OUTPUT",
        stage: "output",
        message: e.to_string(),
    })
}

async fn dispatch(
    command: Command,
    settings: &ToolSettings,
    json: bool,
) -> Result<(), CommandError> {
    let presentation = settings.presentation;

    if let Command::Settings = command {
        return emit_value(&settings.redacted());
    }
    if let Command::Presets = command {
        return emit_value(&tools::commands::list_presets());
    }

    let service = ToolService::new(settings.tool_config(), settings.endpoints())?;

    let output = match command {
        Command::Resize {
            file,
            width,
            height,
            preset,
            format,
            quality,
            output,
        } => {
            let mut request = ToolRequest::new(ToolKind::Resize);
            request.format = parse_format(format.as_deref())?;
            request.quality = quality;
            match preset {
                Some(name) => {
                    let preset = ResizePreset::find(&name).ok_or_else(|| CommandError {
                        code: "E_VALIDATION",
                        stage: "preflight",
                        message: format!("未知尺寸预设：{}", name),
                    })?;
                    request.width = Some(preset.width);
                    request.height = Some(preset.height);
                }
                None => {
                    request.width = width;
                    request.height = height;
                }
            }
            tools::commands::process_file(&service, &file, request, &output.out_dir, presentation)
                .await?
        }
        Command::Convert {
            file,
            format,
            quality,
            output,
        } => {
            let mut request = ToolRequest::new(ToolKind::Convert);
            request.format = parse_format(Some(format.as_str()))?;
            request.quality = quality;
            tools::commands::process_file(&service, &file, request, &output.out_dir, presentation)
                .await?
        }
        Command::Compress {
            files,
            format,
            quality,
            preset,
            output,
        } => {
            if let Some(preset) = preset.as_deref() {
                service.set_compression_preset(preset)?;
            }
            let mut request = ToolRequest::new(ToolKind::Compress);
            request.format = parse_format(format.as_deref())?;
            request.quality = quality;
            tools::commands::compress_files(
                &service,
                &files,
                request,
                &output.out_dir,
                presentation,
            )
            .await?
        }
        Command::RemoveBg { file, output } => {
            let request = ToolRequest::new(ToolKind::RemoveBackground);
            tools::commands::process_file(&service, &file, request, &output.out_dir, presentation)
                .await?
        }
        Command::Pdf { files, output } => {
            tools::commands::images_to_pdf(&service, &files, &output.out_dir, presentation).await?
        }
        Command::Qr {
            text,
            size,
            fg,
            bg,
            copy,
            output,
        } => {
            let request = QrRequest {
                text,
                size,
                fg_color: fg,
                bg_color: bg,
            };
            tools::commands::generate_qr(&service, request, &output.out_dir, copy, presentation)
                .await?
        }
        Command::Estimate {
            file,
            tool,
            width,
            height,
            format,
            quality,
        } => {
            let mut request = ToolRequest::new(tool);
            request.format = parse_format(format.as_deref())?;
            request.quality = quality;
            request.width = width;
            request.height = height;
            let report = tools::commands::estimate(&service, &file, request).await?;
            return emit_value(&report);
        }
        Command::Presets | Command::Settings => return Ok(()),
    };

    if settings.ads.ads_enabled() {
        log::debug!("📢 广告位已配置 - slot={:?}", settings.ads.slot);
    }

    if json {
        return emit_value(&output);
    }
    println!("{}", output.message);
    for saved in &output.outputs {
        println!("  {}", saved.path.display());
    }
    for failure in &output.failures {
        eprintln!(
            "  {}: {}",
            failure.name,
            presentation.decorate_error(&failure.error.message)
        );
    }
    Ok(())
}
