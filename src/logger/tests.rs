//! Tests for the logger module

use crate::logger::config::*;
use std::path::PathBuf;

#[cfg(test)]
mod config_tests {
    use super::*;

    fn create_test_config() -> LoggerConfig {
        LoggerConfig {
            console: ConsoleConfig {
                enabled: true,
                colored: false,
            },
            file: FileConfig {
                enabled: false,
                path: PathBuf::from("test.log"),
                append: true,
                format: LogFormat::Full,
            },
            level: "info".to_string(),
        }
    }

    #[test]
    fn test_default_config_creation() {
        let config = LoggerConfig::default();
        assert!(config.console.enabled);
        assert!(config.console.colored);
        assert!(!config.file.enabled);
        assert_eq!(config.file.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = create_test_config();
        assert!(config.validate().is_ok());

        config.console.enabled = false;
        config.file.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Full);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::Full.as_str(), "full");
        assert!("pretty".parse::<LogFormat>().is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn property_valid_configs_validate(
            console_enabled in any::<bool>(),
            file_enabled in any::<bool>(),
            colored in any::<bool>(),
            append in any::<bool>(),
            level in prop_oneof![
                Just("trace"), Just("debug"), Just("info"), Just("warn"), Just("error"), Just("INFO")
            ]
        ) {
            prop_assume!(console_enabled || file_enabled);

            let config = LoggerConfig {
                console: ConsoleConfig { enabled: console_enabled, colored },
                file: FileConfig {
                    enabled: file_enabled,
                    path: PathBuf::from("test.log"),
                    append,
                    format: LogFormat::Compact,
                },
                level: level.to_string(),
            };

            prop_assert!(config.validate().is_ok());
            prop_assert!(config.parse_level().is_ok());
        }

        #[test]
        fn property_invalid_levels_fail(
            invalid_level in "[a-z]{1,10}[A-Z0-9]{1,5}"
        ) {
            prop_assume!(!["trace", "debug", "info", "warn", "error"]
                .contains(&invalid_level.to_lowercase().as_str()));

            let config = LoggerConfig {
                level: invalid_level,
                ..Default::default()
            };

            prop_assert!(config.validate().is_err());
        }
    }

    #[test]
    fn empty_path_fails_when_enabled() {
        let config = FileConfig {
            enabled: true,
            path: PathBuf::new(),
            append: true,
            format: LogFormat::Full,
        };
        assert!(config.validate().is_err());

        let disabled = FileConfig {
            enabled: false,
            ..config
        };
        assert!(disabled.validate().is_ok());
    }
}

#[cfg(test)]
mod writer_tests {
    use super::*;
    use crate::logger::writer::open_log_file;
    use proptest::prelude::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn property_file_path_handling(
            subdir in "[a-z]{1,5}",
            filename in "[a-z]{1,5}\\.log"
        ) {
            let dir = tempdir().unwrap();
            let nested_path = dir.path().join(&subdir).join(&filename);

            let config = FileConfig {
                enabled: true,
                path: nested_path.clone(),
                append: true,
                format: LogFormat::Json,
            };

            prop_assert!(open_log_file(&config).is_ok());
            prop_assert!(nested_path.parent().unwrap().exists());
        }

        #[test]
        fn property_file_write_mode(
            append in any::<bool>(),
            initial_content in "[a-zA-Z0-9]{10,50}",
            new_content in "[a-zA-Z0-9]{10,50}"
        ) {
            let dir = tempdir().unwrap();
            let file_path = dir.path().join("test.log");
            fs::write(&file_path, &initial_content).unwrap();

            let config = FileConfig {
                enabled: true,
                path: file_path.clone(),
                append,
                format: LogFormat::Full,
            };

            let writer = open_log_file(&config).unwrap();
            let mut guard = tracing_subscriber::fmt::MakeWriter::make_writer(&writer);
            guard.write_all(new_content.as_bytes()).unwrap();
            guard.flush().unwrap();
            drop(guard);

            let final_content = fs::read_to_string(&file_path).unwrap();
            if append {
                prop_assert!(final_content.contains(&initial_content));
            } else {
                prop_assert!(!final_content.contains(&initial_content));
            }
            prop_assert!(final_content.contains(&new_content));
        }
    }

    #[test]
    fn empty_path_is_rejected() {
        let config = FileConfig {
            enabled: true,
            path: PathBuf::new(),
            append: true,
            format: LogFormat::Full,
        };
        assert!(matches!(
            open_log_file(&config),
            Err(crate::logger::LoggerError::Config { .. })
        ));
    }
}

#[cfg(test)]
mod subscriber_tests {
    use super::*;
    use crate::logger::build_subscriber;
    use std::fs;
    use tempfile::tempdir;
    use tracing_subscriber::EnvFilter;

    fn config_with_file(path: PathBuf, format: LogFormat, console: bool) -> LoggerConfig {
        LoggerConfig {
            console: ConsoleConfig {
                enabled: console,
                colored: true,
            },
            file: FileConfig {
                enabled: true,
                path,
                append: true,
                format,
            },
            level: "info".to_string(),
        }
    }

    #[test]
    fn every_file_format_writes_with_and_without_console() {
        for format in [LogFormat::Full, LogFormat::Compact, LogFormat::Json] {
            for console in [true, false] {
                let dir = tempdir().unwrap();
                let path = dir.path().join("fence.log");
                let config = config_with_file(path.clone(), format.clone(), console);

                let subscriber = build_subscriber(&config, EnvFilter::new("info")).unwrap();
                tracing::subscriber::with_default(subscriber, || {
                    tracing::info!(entity_id = 7, "fence written");
                });

                let content = fs::read_to_string(&path).unwrap();
                assert!(content.contains("fence written"), "{:?}: {}", format, content);
                assert!(!content.contains('\u{1b}'), "{:?} leaked ANSI codes", format);
            }
        }
    }

    #[test]
    fn no_output_is_rejected() {
        let mut config = LoggerConfig::default();
        config.console.enabled = false;
        config.file.enabled = false;
        assert!(build_subscriber(&config, EnvFilter::new("info")).is_err());
    }
}
